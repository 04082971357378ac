//! Sequential map with per-item failure isolation.

use async_trait::async_trait;

/// A fallible per-item transform.
#[async_trait]
pub trait ItemTransform<T: Sync>: Send + Sync {
    type Error: Send;

    async fn apply(&self, index: usize, item: &T) -> Result<T, Self::Error>;
}

/// Receives progress and per-item failures while [`map_isolated`] runs.
pub trait MapObserver<E> {
    fn on_progress(&mut self, fraction: f64);
    fn on_error(&mut self, index: usize, error: &E);
}

/// Adapts a pair of closures into a [`MapObserver`].
pub struct Callbacks<P, F> {
    pub progress: P,
    pub error: F,
}

impl<E, P, F> MapObserver<E> for Callbacks<P, F>
where
    P: FnMut(f64),
    F: FnMut(usize, &E),
{
    fn on_progress(&mut self, fraction: f64) {
        (self.progress)(fraction)
    }

    fn on_error(&mut self, index: usize, error: &E) {
        (self.error)(index, error)
    }
}

impl<E, O: MapObserver<E> + ?Sized> MapObserver<E> for &mut O {
    fn on_progress(&mut self, fraction: f64) {
        (**self).on_progress(fraction)
    }

    fn on_error(&mut self, index: usize, error: &E) {
        (**self).on_error(index, error)
    }
}

/// Output of [`map_isolated`]: one item per input, plus the failures.
#[derive(Debug)]
pub struct Isolated<T, E> {
    pub items: Vec<T>,
    pub failures: Vec<(usize, E)>,
}

/// Applies `transform` to each item in order. An item whose transform fails
/// is kept as is and its error recorded; the run never aborts early.
///
/// After every item, `(i + 1) / n` is reported as progress. An empty input
/// reports nothing.
pub async fn map_isolated<T, X, O>(
    items: Vec<T>,
    transform: &X,
    mut observer: O,
) -> Isolated<T, X::Error>
where
    T: Send + Sync,
    X: ItemTransform<T> + ?Sized,
    O: MapObserver<X::Error>,
{
    let total = items.len();
    let mut out = Vec::with_capacity(total);
    let mut failures = Vec::new();

    for (index, item) in items.into_iter().enumerate() {
        match transform.apply(index, &item).await {
            Ok(transformed) => out.push(transformed),
            Err(err) => {
                observer.on_error(index, &err);
                failures.push((index, err));
                out.push(item);
            }
        }
        observer.on_progress((index + 1) as f64 / total as f64);
    }

    Isolated {
        items: out,
        failures,
    }
}
