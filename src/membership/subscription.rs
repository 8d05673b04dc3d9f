use futures::Stream;

use super::store::{ChangeNotification, MembershipStore};
use crate::error::MembershipError;

/// A persistent view over the children of one namespace.
///
/// The first `next()` returns the current listing. Every later call waits for
/// the change notification armed by the previous listing and lists again,
/// re-arming as it goes. After an error the armed notification is dropped and
/// the following call starts over with a fresh listing.
pub struct ChildrenSubscription {
    store: MembershipStore,
    path: String,
    pending: Option<ChangeNotification>,
}

impl ChildrenSubscription {
    pub(crate) fn new(store: MembershipStore, path: &str) -> Self {
        Self {
            store,
            path: path.to_string(),
            pending: None,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub async fn next(&mut self) -> Result<Vec<String>, MembershipError> {
        if let Some(notification) = self.pending.take() {
            match notification.fired().await {
                Some(event) => {
                    tracing::debug!("{:?} on {}", event.event_type, event.path)
                }
                None => tracing::debug!("Watch on {} closed without an event", self.path),
            }
        }

        let (children, notification) = self.store.list_children_with_watch(&self.path).await?;
        self.pending = Some(notification);

        Ok(children)
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<Vec<String>, MembershipError>> {
        futures::stream::unfold(self, |mut subscription| async move {
            let listing = subscription.next().await;
            Some((listing, subscription))
        })
    }
}
