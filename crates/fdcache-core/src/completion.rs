//! The completion capability through which results reach the host.

use tokio::sync::oneshot;

use crate::error::{FileError, FileResult};

/// A one-shot resolve/reject capability.
///
/// The file manager calls exactly one of [`resolve`](Self::resolve) or
/// [`reject`](Self::reject) per requested operation, from whichever
/// task performed the I/O. Both consume the completion, so a double
/// delivery is unrepresentable.
///
/// Hosts that await futures get this for free: the sending half of a
/// [`oneshot`] channel of [`FileResult`] is a completion, and its
/// paired receiver is the future-shaped result. Hosts with their own
/// promise machinery implement the trait on their deferred-value type.
pub trait Completion<T>: Send {
    /// Deliver a successful result.
    fn resolve(self, value: T);

    /// Deliver a typed failure.
    fn reject(self, error: FileError);
}

/// The canonical completion.
///
/// Delivery is suppressed, not an error, when the receiving half has
/// been dropped: a caller that lost interest must not fail the task
/// that performed the I/O.
impl<T: Send> Completion<T> for oneshot::Sender<FileResult<T>> {
    fn resolve(self, value: T) {
        let _ = self.send(Ok(value));
    }

    fn reject(self, error: FileError) {
        let _ = self.send(Err(error));
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::mode::AccessMode;

    fn deliver<C: Completion<u64>>(completion: C, outcome: FileResult<u64>) {
        match outcome {
            Ok(value) => completion.resolve(value),
            Err(error) => completion.reject(error),
        }
    }

    #[tokio::test]
    async fn resolve_reaches_the_receiver() {
        let (tx, rx) = oneshot::channel();
        deliver(tx, Ok(7));
        assert_eq!(rx.await.unwrap().unwrap(), 7);
    }

    #[tokio::test]
    async fn reject_reaches_the_receiver() {
        let (tx, rx) = oneshot::channel();
        deliver(
            tx,
            Err(FileError::FileDoesNotExist {
                path: PathBuf::from("gone"),
                mode: AccessMode::Read,
            }),
        );
        let delivered = rx.await.unwrap();
        assert!(matches!(delivered, Err(FileError::FileDoesNotExist { .. })));
    }

    #[tokio::test]
    async fn dropped_receiver_suppresses_delivery() {
        let (tx, rx) = oneshot::channel();
        drop(rx);
        deliver(tx, Ok(1));
    }
}
