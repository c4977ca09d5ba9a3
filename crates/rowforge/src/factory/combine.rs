//! Combining multi-row tuples into results.
//!
//! A [`Combiner`] receives one tuple per row and either emits a result or keeps
//! accumulating. When the cursor ends, [`Combiner::finish`] flushes whatever is
//! still pending; this is how one parent joined to many children comes out as a
//! single parent with a filled collection.

use super::multi::{LinkPlan, MultiMapped};
use crate::error::OrmResult;
use std::marker::PhantomData;

/// Outcome of combining one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<R> {
    /// Yield this result now.
    Emit(R),
    /// Keep reading; nothing to yield for this row.
    Pending,
}

/// Turns a stream of tuples into results.
pub trait Combiner<T> {
    type Output;

    /// Called once with the factory's inferred link plan before the first row.
    fn prepare(&mut self, plan: &LinkPlan) {
        let _ = plan;
    }

    fn combine(&mut self, item: T) -> OrmResult<Step<Self::Output>>;

    /// Called once after the last row.
    fn finish(&mut self) -> OrmResult<Option<Self::Output>> {
        Ok(None)
    }
}

/// A combiner that maps every tuple to one result.
pub struct FnCombiner<F> {
    f: F,
}

/// Combine each tuple with `f`; never accumulates.
pub fn combine<T, R, F>(f: F) -> FnCombiner<F>
where
    F: FnMut(T) -> R,
{
    FnCombiner { f }
}

impl<T, R, F> Combiner<T> for FnCombiner<F>
where
    F: FnMut(T) -> R,
{
    type Output = R;

    fn combine(&mut self, item: T) -> OrmResult<Step<R>> {
        Ok(Step::Emit((self.f)(item)))
    }
}

/// A combiner driven by a relator callback.
pub struct Relate<F> {
    f: F,
}

/// Relator-style accumulation.
///
/// `f` receives `Some(tuple)` for each row and `None` once after the last row.
/// Returning `None` means "still accumulating"; returning `Some(result)` emits it.
///
/// ```ignore
/// let mut current: Option<Author> = None;
/// let authors = db
///     .fetch_multi::<(Author, Post), _>(sql, relate(move |row: Option<(Author, Post)>| {
///         match row {
///             None => current.take(),
///             Some((a, p)) if current.as_ref().is_some_and(|c| c.id == a.id) => {
///                 current.as_mut().unwrap().posts.push(p);
///                 None
///             }
///             Some((mut a, p)) => {
///                 a.posts.push(p);
///                 current.replace(a)
///             }
///         }
///     }))
///     .await?;
/// ```
pub fn relate<T, R, F>(f: F) -> Relate<F>
where
    F: FnMut(Option<T>) -> Option<R>,
{
    Relate { f }
}

impl<T, R, F> Combiner<T> for Relate<F>
where
    F: FnMut(Option<T>) -> Option<R>,
{
    type Output = R;

    fn combine(&mut self, item: T) -> OrmResult<Step<R>> {
        Ok(match (self.f)(Some(item)) {
            Some(result) => Step::Emit(result),
            None => Step::Pending,
        })
    }

    fn finish(&mut self) -> OrmResult<Option<R>> {
        Ok((self.f)(None))
    }
}

/// Groups consecutive rows with the same parent key into one parent.
///
/// Rows must arrive ordered by the parent key.
pub struct OneToMany<P, C, K, FK, FA> {
    key: FK,
    attach: FA,
    current: Option<(K, P)>,
    _marker: PhantomData<fn(C)>,
}

impl<P, C, K, FK, FA> OneToMany<P, C, K, FK, FA>
where
    K: PartialEq,
    FK: FnMut(&P) -> K,
    FA: FnMut(&mut P, C),
{
    pub fn new(key: FK, attach: FA) -> Self {
        Self {
            key,
            attach,
            current: None,
            _marker: PhantomData,
        }
    }
}

impl<P, C, K, FK, FA> Combiner<(P, C)> for OneToMany<P, C, K, FK, FA>
where
    K: PartialEq,
    FK: FnMut(&P) -> K,
    FA: FnMut(&mut P, C),
{
    type Output = P;

    fn combine(&mut self, (parent, child): (P, C)) -> OrmResult<Step<P>> {
        let key = (self.key)(&parent);
        if let Some((current_key, current)) = self.current.as_mut() {
            if *current_key == key {
                (self.attach)(current, child);
                return Ok(Step::Pending);
            }
        }

        let mut parent = parent;
        (self.attach)(&mut parent, child);
        Ok(match self.current.replace((key, parent)) {
            Some((_, finished)) => Step::Emit(finished),
            None => Step::Pending,
        })
    }

    fn finish(&mut self) -> OrmResult<Option<P>> {
        Ok(self.current.take().map(|(_, parent)| parent))
    }
}

/// Stitches each tuple into its root using the factory's inferred [`LinkPlan`].
///
/// Elements with no matching relation member are dropped without error; pass an
/// explicit combiner when inference does not fit.
pub struct AutoLink<T> {
    plan: LinkPlan,
    _marker: PhantomData<fn(T)>,
}

impl<T> AutoLink<T> {
    pub fn new() -> Self {
        Self {
            plan: LinkPlan::default(),
            _marker: PhantomData,
        }
    }
}

impl<T> Default for AutoLink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: MultiMapped> Combiner<T> for AutoLink<T> {
    type Output = T::Root;

    fn prepare(&mut self, plan: &LinkPlan) {
        self.plan = plan.clone();
    }

    fn combine(&mut self, item: T) -> OrmResult<Step<T::Root>> {
        self.plan.apply(item).map(Step::Emit)
    }
}
