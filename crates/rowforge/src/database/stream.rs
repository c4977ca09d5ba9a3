use crate::client::RowStream;
use crate::error::OrmResult;
use crate::factory::{FactoryScope, RowFactory, get_row_factory_in};
use crate::mapped::Mapped;
use crate::pg::row_shape;
use crate::schema::{Mapper, schema_registry};
use futures_core::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio_postgres::Row;

/// Rows of a streamed query, materialized one at a time.
///
/// Ends after the first error.
#[must_use]
pub struct MappedStream<T> {
    inner: RowStream,
    mapper: Arc<dyn Mapper>,
    scope: FactoryScope,
    factory: Option<Arc<RowFactory<T>>>,
    done: bool,
}

impl<T: Mapped> MappedStream<T> {
    pub(crate) fn new(inner: RowStream, mapper: Arc<dyn Mapper>, scope: FactoryScope) -> Self {
        Self {
            inner,
            mapper,
            scope,
            factory: None,
            done: false,
        }
    }

    fn build(&mut self, row: &Row) -> OrmResult<T> {
        let factory = match &self.factory {
            Some(factory) => factory.clone(),
            None => {
                let shape = row_shape(Some(row));
                let schema = schema_registry().schema_for::<T>(&self.mapper);
                let factory = get_row_factory_in::<T>(&self.scope, &shape, &schema, 0, shape.len())?;
                self.factory = Some(factory.clone());
                factory
            }
        };
        factory.build(row)
    }
}

impl<T: Mapped> Stream for MappedStream<T> {
    type Item = OrmResult<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        let item = match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(row))) => this.build(&row),
            Poll::Ready(Some(Err(e))) => Err(e),
            Poll::Ready(None) => {
                this.done = true;
                return Poll::Ready(None);
            }
            Poll::Pending => return Poll::Pending,
        };
        if item.is_err() {
            this.done = true;
        }
        Poll::Ready(Some(item))
    }
}
