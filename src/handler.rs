//! Listener interface for callers that prefer callbacks over iteration.

use futures::{Stream, StreamExt};

use crate::client::ClientError;
use crate::model::{Completion, StreamEvent};

/// Receives the events of one streaming call.
///
/// `on_chunk` is called zero or more times, in stream order. At most one of
/// `on_done` / `on_error` follows, and nothing is called after it.
///
/// # Example
/// ```
/// use genstream::handler::StreamHandler;
/// use genstream::model::Completion;
///
/// #[derive(Default)]
/// struct Collect(String);
///
/// impl StreamHandler for Collect {
///     fn on_chunk(&mut self, content: &str) {
///         self.0.push_str(content);
///     }
///
///     fn on_done(&mut self, completion: Completion) {
///         println!("{} tokens from {}", completion.tokens_used, completion.model);
///     }
/// }
/// ```
pub trait StreamHandler {
    /// A partial content fragment arrived.
    fn on_chunk(&mut self, content: &str);

    /// The producer finished successfully.
    fn on_done(&mut self, completion: Completion);

    /// The stream failed after it started.
    ///
    /// The default returns the error, which makes the driving call fail with
    /// it. Return `Ok(())` to mark the error as handled.
    fn on_error(&mut self, error: ClientError) -> Result<(), ClientError> {
        Err(error)
    }
}

/// A [`StreamHandler`] made of closures. Build it with [`callbacks`].
pub struct Callbacks<C, D, E = fn(ClientError)> {
    on_chunk: C,
    on_done: D,
    on_error: Option<E>,
}

/// Handler from chunk and completion closures; errors are raised unless
/// [`Callbacks::on_error`] is set.
pub fn callbacks<C, D>(on_chunk: C, on_done: D) -> Callbacks<C, D>
where
    C: FnMut(&str),
    D: FnMut(Completion),
{
    Callbacks {
        on_chunk,
        on_done,
        on_error: None,
    }
}

impl<C, D, E> Callbacks<C, D, E> {
    /// Handle stream errors with `f` instead of raising them.
    pub fn on_error<F>(self, f: F) -> Callbacks<C, D, F>
    where
        F: FnMut(ClientError),
    {
        Callbacks {
            on_chunk: self.on_chunk,
            on_done: self.on_done,
            on_error: Some(f),
        }
    }
}

impl<C, D, E> StreamHandler for Callbacks<C, D, E>
where
    C: FnMut(&str),
    D: FnMut(Completion),
    E: FnMut(ClientError),
{
    fn on_chunk(&mut self, content: &str) {
        (self.on_chunk)(content)
    }

    fn on_done(&mut self, completion: Completion) {
        (self.on_done)(completion)
    }

    fn on_error(&mut self, error: ClientError) -> Result<(), ClientError> {
        match self.on_error.as_mut() {
            Some(f) => {
                f(error);
                Ok(())
            }
            None => Err(error),
        }
    }
}

/// Drive an event stream into `handler` until it ends.
///
/// Cancellation is returned to the caller directly and never reaches the
/// handler.
pub async fn dispatch<S, H>(events: S, handler: &mut H) -> Result<(), ClientError>
where
    S: Stream<Item = Result<StreamEvent, ClientError>>,
    H: StreamHandler + ?Sized,
{
    futures::pin_mut!(events);

    while let Some(item) = events.next().await {
        match item {
            Ok(StreamEvent::Chunk(content)) => handler.on_chunk(&content),
            Ok(StreamEvent::Done(completion)) => handler.on_done(completion),
            Err(ClientError::StreamCancelled) => return Err(ClientError::StreamCancelled),
            Err(e) => handler.on_error(e)?,
        }
    }
    Ok(())
}
