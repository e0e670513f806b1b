//! Greedy decoding of quantized model outputs.
//!
//! Two unrelated decoders:
//! - a greedy sequence decoder with window-context stitching for
//!   continuous recognition (drop the blank class, collapse repeats, emit
//!   only the context slice this window is trusted for);
//! - an argmax classifier for keyword spotting.

use serde::Deserialize;

use crate::quantize::QuantParams;

/// Trusted output-step partition of one inference window.
///
/// A fixed property of the trained model's receptive field; supplied as
/// configuration, never derived. Neighboring windows overlap by
/// `left + right` steps, so only the middle is emitted for interior
/// windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ContextWindow {
    pub left: usize,
    pub middle: usize,
    pub right: usize,
}

impl ContextWindow {
    /// Total output steps per inference window.
    #[must_use]
    pub fn total_steps(&self) -> usize {
        self.left + self.middle + self.right
    }

    #[must_use]
    pub fn middle_start(&self) -> usize {
        self.left
    }

    #[must_use]
    pub fn middle_end(&self) -> usize {
        self.left + self.middle
    }
}

/// Which slice of a window's output may be emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextSlice {
    /// First window of a stream: left + middle.
    LeftAndMiddle,
    /// Interior window: middle only.
    MiddleOnly,
    /// Trailing fragment of the final window: right only.
    RightOnly,
}

/// Greedy sequence decoder for a fixed label table.
#[derive(Debug, Clone)]
pub struct GreedyDecoder {
    labels: Vec<char>,
    blank: char,
    context: ContextWindow,
}

impl GreedyDecoder {
    #[must_use]
    pub fn new(labels: Vec<char>, blank: char, context: ContextWindow) -> Self {
        Self {
            labels,
            blank,
            context,
        }
    }

    #[must_use]
    pub fn context(&self) -> ContextWindow {
        self.context
    }

    /// Decode the selected context slice of one window's output.
    ///
    /// `scores` is row-major `total_steps x num_labels`; scores may stay in
    /// their quantized representation because argmax is invariant under a
    /// positive-scale affine map. Rows whose argmax is the blank label and
    /// runs of repeated characters collapse away.
    #[must_use]
    pub fn decode_window<T: Copy + PartialOrd>(&self, scores: &[T], slice: ContextSlice) -> String {
        let num_labels = self.labels.len();
        let (start, end) = match slice {
            ContextSlice::LeftAndMiddle => (0, self.context.middle_end()),
            ContextSlice::MiddleOnly => (self.context.middle_start(), self.context.middle_end()),
            ContextSlice::RightOnly => (self.context.middle_end(), self.context.total_steps()),
        };

        let mut text = String::new();
        let mut prev: Option<char> = None;
        for step in start..end {
            let row = &scores[step * num_labels..(step + 1) * num_labels];
            let ch = self.labels[argmax(row)];
            if ch != self.blank && prev != Some(ch) {
                text.push(ch);
            }
            prev = Some(ch);
        }
        text
    }
}

/// Index of the largest element. Ties keep the earliest index.
fn argmax<T: Copy + PartialOrd>(row: &[T]) -> usize {
    debug_assert!(!row.is_empty());
    let mut best = 0usize;
    for (i, &v) in row.iter().enumerate().skip(1) {
        if v > row[best] {
            best = i;
        }
    }
    best
}

/// Winning class of a single quantized classification vector, with its
/// dequantized score.
#[must_use]
pub fn classify(scores: &[i8], quant: QuantParams) -> Option<(usize, f32)> {
    if scores.is_empty() {
        return None;
    }
    let index = argmax(scores);
    let score = quant.dequantize(i32::from(scores[index]));
    Some((index, score))
}
