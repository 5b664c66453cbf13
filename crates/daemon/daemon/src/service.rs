//! Dispatcher service implementation.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tower_service::Service;

use crate::dispatch::{Dispatcher, InboundCall, Reply};

/// [`Service`] front of a shared [`Dispatcher`].
///
/// Cloning is cheap; every clone drives the same dispatcher.
#[derive(Debug, Clone)]
pub struct DispatchService {
	dispatcher: Arc<Dispatcher>,
}

impl DispatchService {
	/// Wraps a dispatcher.
	#[must_use]
	pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
		Self { dispatcher }
	}

	/// The wrapped dispatcher.
	pub fn dispatcher(&self) -> &Arc<Dispatcher> {
		&self.dispatcher
	}
}

impl Service<InboundCall> for DispatchService {
	type Response = Reply;
	type Error = Infallible;
	type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

	fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
		Poll::Ready(Ok(()))
	}

	fn call(&mut self, call: InboundCall) -> Self::Future {
		let dispatcher = self.dispatcher.clone();
		Box::pin(async move { Ok(dispatcher.dispatch(call).await) })
	}
}
