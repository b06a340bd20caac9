//! Exact best-sequence search over a windowed lattice.
//!
//! Positions are padded: `left_window()` slots before the sequence and
//! `right_window()` slots after it, each holding the single value [`PAD`].
//! A lattice state at position `pos` is the assignment of every position in
//! `[pos - left, pos + right]`, encoded mixed-radix with `pos + right` as the
//! least significant digit.

/// Value occupying padding positions.
pub const PAD: usize = usize::MAX;

pub trait SequenceModel {
    /// Number of real positions, padding excluded.
    fn length(&self) -> usize;

    fn left_window(&self) -> usize;

    fn right_window(&self) -> usize;

    /// Candidate values at padded position `pos`; never empty.
    fn possible_values(&self, pos: usize) -> &[usize];

    /// Scores of each candidate at padded position `pos`, in
    /// [`possible_values`](Self::possible_values) order, given the values in
    /// `tags` for the rest of the window.
    fn scores_of(&mut self, tags: &[usize], pos: usize) -> Vec<f64>;
}

/// Returns the padded best assignment and its total score.
///
/// The value for real position `i` sits at index `i + left_window()`.
pub fn best_sequence<M: SequenceModel + ?Sized>(model: &mut M) -> (Vec<usize>, f64) {
    let length = model.length();
    let left = model.left_window();
    let right = model.right_window();
    let pad_length = length + left + right;
    if length == 0 {
        return (vec![PAD; pad_length], 0.0);
    }

    let tags: Vec<Vec<usize>> = (0..pad_length)
        .map(|pos| model.possible_values(pos).to_vec())
        .collect();
    let tag_num: Vec<usize> = tags.iter().map(Vec::len).collect();
    debug_assert!(tag_num.iter().all(|&n| n > 0));

    // number of window assignments, indexed by the window's center
    let mut product_sizes = vec![0usize; pad_length];
    let mut cur_product: usize = tag_num[..left + right].iter().product();
    for pos in left + right..pad_length {
        if pos > left + right {
            cur_product /= tag_num[pos - left - right - 1];
        }
        cur_product *= tag_num[pos];
        product_sizes[pos - right] = cur_product;
    }

    let mut temp_tags = vec![PAD; pad_length];

    // local scores of every window assignment
    let mut window_score: Vec<Vec<f64>> = vec![Vec::new(); pad_length];
    for pos in left..left + length {
        window_score[pos] = vec![0.0; product_sizes[pos]];
        for product in 0..product_sizes[pos] {
            let mut p = product;
            let mut shift = 1;
            for cur in (pos - left..=pos + right).rev() {
                temp_tags[cur] = tags[cur][p % tag_num[cur]];
                p /= tag_num[cur];
                if cur > pos {
                    shift *= tag_num[cur];
                }
            }
            if temp_tags[pos] == tags[pos][0] {
                let scores = model.scores_of(&temp_tags, pos);
                for (t, &s) in scores.iter().enumerate().take(tag_num[pos]) {
                    window_score[pos][product + t * shift] = s;
                }
            }
        }
    }

    let mut score: Vec<Vec<f64>> = vec![Vec::new(); pad_length];
    let mut trace: Vec<Vec<usize>> = vec![Vec::new(); pad_length];
    for pos in left..left + length {
        score[pos] = vec![f64::NEG_INFINITY; product_sizes[pos]];
        trace[pos] = vec![0; product_sizes[pos]];
        for product in 0..product_sizes[pos] {
            if pos == left {
                score[pos][product] = window_score[pos][product];
                continue;
            }
            let shared_product = product / tag_num[pos + right];
            let factor = product_sizes[pos] / tag_num[pos + right];
            for new_tag in 0..tag_num[pos - left - 1] {
                let pred = new_tag * factor + shared_product;
                let candidate = score[pos - 1][pred] + window_score[pos][product];
                if candidate > score[pos][product] {
                    score[pos][product] = candidate;
                    trace[pos][product] = pred;
                }
            }
        }
    }

    let last = left + length - 1;
    let mut best_score = f64::NEG_INFINITY;
    let mut best_product = 0;
    for (product, &s) in score[last].iter().enumerate() {
        if s > best_score {
            best_score = s;
            best_product = product;
        }
    }

    // unpack the final window, then follow the trace
    let mut p = best_product;
    for pos in (length - 1..pad_length).rev() {
        temp_tags[pos] = tags[pos][p % tag_num[pos]];
        p /= tag_num[pos];
    }
    let mut current = best_product;
    for pos in (left..last).rev() {
        current = trace[pos + 1][current];
        let radix = product_sizes[pos] / tag_num[pos - left];
        temp_tags[pos - left] = tags[pos - left][current / radix];
    }
    (temp_tags, best_score)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scores depend on the tag pair `(previous, current)` and, with a right
    /// window, on the next tag too.
    struct Toy {
        len: usize,
        left: usize,
        right: usize,
        values: Vec<Vec<usize>>,
        calls: usize,
    }

    impl Toy {
        fn new(len: usize, left: usize, right: usize, n: usize) -> Self {
            let mut values = vec![vec![PAD]; left];
            for i in 0..len {
                // vary the candidate count across positions
                values.push((0..n - i % 2).collect());
            }
            values.extend(std::iter::repeat(vec![PAD]).take(right));
            Self {
                len,
                left,
                right,
                values,
                calls: 0,
            }
        }

        fn local(&self, tags: &[usize], pos: usize, y: usize) -> f64 {
            let mut s = ((pos * 7 + y * 13) % 11) as f64 * 0.1;
            for k in 1..=self.left {
                let prev = tags[pos - k];
                if prev != PAD {
                    s += ((prev * 5 + y * 3 + k) % 7) as f64 * 0.17;
                }
            }
            for k in 1..=self.right {
                let next = tags[pos + k];
                if next != PAD {
                    s += ((next * 2 + y + k) % 5) as f64 * 0.05;
                }
            }
            s
        }

        fn total(&mut self, tags: &[usize]) -> f64 {
            let mut sum = 0.0;
            for pos in self.left..self.left + self.len {
                let i = self.values[pos].iter().position(|&v| v == tags[pos]).unwrap();
                sum += self.scores_of(tags, pos)[i];
            }
            sum
        }

        fn brute_force(&mut self) -> f64 {
            let mut best = f64::NEG_INFINITY;
            let mut assignment: Vec<usize> = self.values.iter().map(|v| v[0]).collect();
            loop {
                best = best.max(self.total(&assignment));
                // odometer over the real positions
                let mut pos = self.left;
                loop {
                    if pos == self.left + self.len {
                        return best;
                    }
                    let i = self.values[pos].iter().position(|&v| v == assignment[pos]).unwrap();
                    if i + 1 < self.values[pos].len() {
                        assignment[pos] = self.values[pos][i + 1];
                        break;
                    }
                    assignment[pos] = self.values[pos][0];
                    pos += 1;
                }
            }
        }
    }

    impl SequenceModel for Toy {
        fn length(&self) -> usize {
            self.len
        }

        fn left_window(&self) -> usize {
            self.left
        }

        fn right_window(&self) -> usize {
            self.right
        }

        fn possible_values(&self, pos: usize) -> &[usize] {
            &self.values[pos]
        }

        fn scores_of(&mut self, tags: &[usize], pos: usize) -> Vec<f64> {
            self.calls += 1;
            let values = self.values[pos].clone();
            values.iter().map(|&y| self.local(tags, pos, y)).collect()
        }
    }

    fn check(len: usize, left: usize, right: usize, n: usize) {
        let mut toy = Toy::new(len, left, right, n);
        let (tags, score) = best_sequence(&mut toy);
        assert_eq!(tags.len(), len + left + right);
        assert!(tags[..left].iter().all(|&t| t == PAD));
        assert!(tags[left + len..].iter().all(|&t| t == PAD));
        let total = toy.total(&tags);
        assert!((total - score).abs() < 1e-9, "{total} vs {score}");
        let best = toy.brute_force();
        assert!((best - score).abs() < 1e-9, "{best} vs {score}");
    }

    #[test]
    fn matches_brute_force() {
        check(1, 0, 0, 3);
        check(4, 1, 0, 3);
        check(5, 2, 0, 3);
        check(4, 1, 1, 3);
        check(3, 0, 1, 4);
        check(5, 2, 1, 2);
    }

    #[test]
    fn scores_each_window_once_per_context() {
        let mut toy = Toy::new(3, 1, 0, 3);
        best_sequence(&mut toy);
        // position 0 sees one left context, the others see the previous
        // position's candidates
        assert_eq!(toy.calls, 1 + 3 + 2);
    }

    #[test]
    fn ties_pick_first_value() {
        struct Flat;
        impl SequenceModel for Flat {
            fn length(&self) -> usize {
                3
            }
            fn left_window(&self) -> usize {
                1
            }
            fn right_window(&self) -> usize {
                0
            }
            fn possible_values(&self, pos: usize) -> &[usize] {
                if pos == 0 {
                    &[PAD]
                } else {
                    &[4, 2, 9]
                }
            }
            fn scores_of(&mut self, _tags: &[usize], _pos: usize) -> Vec<f64> {
                vec![-1.0; 3]
            }
        }
        let (tags, score) = best_sequence(&mut Flat);
        assert_eq!(tags, vec![PAD, 4, 4, 4]);
        assert_eq!(score, -3.0);
    }

    #[test]
    fn empty_sequence() {
        let mut toy = Toy::new(0, 1, 1, 2);
        let (tags, score) = best_sequence(&mut toy);
        assert_eq!(tags, vec![PAD, PAD]);
        assert_eq!(score, 0.0);
    }
}
