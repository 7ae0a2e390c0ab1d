//! Random draw of the cards for one practice run

use rand::Rng;

/// Uniformly random permutation of `items`, leaving the input untouched
///
/// Fisher–Yates: walk from the last index down to 1 and swap each slot with
/// one chosen uniformly from `[0, i]`.
pub fn shuffle<T: Clone, R: Rng + ?Sized>(items: &[T], rng: &mut R) -> Vec<T> {
    let mut shuffled = items.to_vec();
    for i in (1..shuffled.len()).rev() {
        let j = rng.gen_range(0..=i);
        shuffled.swap(i, j);
    }
    shuffled
}

/// First `min(limit, items.len())` elements of a fresh shuffle
pub fn sample<T: Clone, R: Rng + ?Sized>(items: &[T], limit: usize, rng: &mut R) -> Vec<T> {
    let mut drawn = shuffle(items, rng);
    drawn.truncate(limit.min(items.len()));
    drawn
}
