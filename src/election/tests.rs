//! Leader Election Tests
//!
//! ## Test Scopes
//! - **Safety**: exactly one leader among `k` candidates, whatever the
//!   evaluation order.
//! - **Predecessor Chain**: each follower watches the candidate just before it.
//! - **Failover**: the driver promotes the next candidate when the leader's
//!   session ends, and leaves unaffected followers alone.

#[cfg(test)]
mod tests {
    use crate::coordination::client::CoordinationClient;
    use crate::coordination::memory::{MemoryCoordinator, MemorySession};
    use crate::election::{ELECTION_NAMESPACE, LeaderElection, Role};
    use crate::error::ElectionError;
    use crate::membership::MembershipStore;
    use std::sync::Arc;
    use std::time::Duration;

    async fn candidate(
        coordinator: &Arc<MemoryCoordinator>,
    ) -> (Arc<LeaderElection>, MemorySession) {
        let session = coordinator.connect();
        let store = MembershipStore::new(Arc::new(session.clone()));
        let election = LeaderElection::new(store, ELECTION_NAMESPACE).await.unwrap();
        election.volunteer_for_leadership().await.unwrap();
        (election, session)
    }

    async fn wait_for_role(election: &LeaderElection, role: Role) {
        let mut roles = election.subscribe();
        tokio::time::timeout(Duration::from_secs(2), roles.wait_for(|r| *r == Some(role)))
            .await
            .expect("role reached in time")
            .expect("election alive");
    }

    // ============================================================
    // SAFETY
    // ============================================================

    #[tokio::test]
    async fn test_exactly_one_leader_in_any_order() {
        let coordinator = MemoryCoordinator::new();

        let mut candidates = Vec::new();
        for _ in 0..5 {
            candidates.push(candidate(&coordinator).await);
        }

        // Evaluate in reverse order of volunteering.
        let mut roles = Vec::new();
        for (election, _) in candidates.iter().rev() {
            roles.push(election.reelect_leader().await.unwrap());
        }

        let leaders = roles.iter().filter(|r| **r == Role::Leader).count();
        assert_eq!(leaders, 1);
        assert!(candidates[0].0.is_leader(), "Oldest candidate leads");
    }

    #[tokio::test]
    async fn test_reelect_requires_volunteering() {
        let coordinator = MemoryCoordinator::new();
        let store = MembershipStore::new(Arc::new(coordinator.connect()));
        let election = LeaderElection::new(store, ELECTION_NAMESPACE).await.unwrap();

        assert!(matches!(
            election.reelect_leader().await,
            Err(ElectionError::NotVolunteered)
        ));
        assert_eq!(election.current_role(), None);
    }

    #[tokio::test]
    async fn test_reelect_with_missing_candidate() {
        let coordinator = MemoryCoordinator::new();
        let (election, session) = candidate(&coordinator).await;

        let name = election.local_name().await.unwrap();
        session
            .delete(&format!("{}/{}", ELECTION_NAMESPACE, name))
            .await
            .unwrap();

        assert!(matches!(
            election.reelect_leader().await,
            Err(ElectionError::CandidateMissing(missing)) if missing == name
        ));
    }

    // ============================================================
    // PREDECESSOR CHAIN
    // ============================================================

    #[tokio::test]
    async fn test_followers_watch_immediate_predecessor() {
        let coordinator = MemoryCoordinator::new();
        let (first, _) = candidate(&coordinator).await;
        let (second, _) = candidate(&coordinator).await;
        let (third, _) = candidate(&coordinator).await;

        assert_eq!(first.reelect_leader().await.unwrap(), Role::Leader);
        assert_eq!(second.reelect_leader().await.unwrap(), Role::Follower);
        assert_eq!(third.reelect_leader().await.unwrap(), Role::Follower);

        assert_eq!(first.predecessor().await, None);
        assert_eq!(second.predecessor().await, first.local_name().await);
        assert_eq!(third.predecessor().await, second.local_name().await);
    }

    #[tokio::test]
    async fn test_role_published_only_on_change() {
        let coordinator = MemoryCoordinator::new();
        let (_leader, _) = candidate(&coordinator).await;
        let (follower, _) = candidate(&coordinator).await;

        let mut roles = follower.subscribe();
        follower.reelect_leader().await.unwrap();
        assert!(roles.has_changed().unwrap());
        assert_eq!(*roles.borrow_and_update(), Some(Role::Follower));

        follower.reelect_leader().await.unwrap();
        assert!(!roles.has_changed().unwrap(), "Still a follower, nothing new");
    }

    // ============================================================
    // FAILOVER
    // ============================================================

    #[tokio::test]
    async fn test_failover_after_leader_session_expires() {
        let coordinator = MemoryCoordinator::new();
        let (leader, leader_session) = candidate(&coordinator).await;
        let (second, _) = candidate(&coordinator).await;
        let (third, _) = candidate(&coordinator).await;

        leader.start();
        second.start();
        third.start();

        wait_for_role(&leader, Role::Leader).await;
        wait_for_role(&second, Role::Follower).await;
        wait_for_role(&third, Role::Follower).await;

        coordinator.expire_session(leader_session.session_id());

        wait_for_role(&second, Role::Leader).await;
        assert_eq!(third.current_role(), Some(Role::Follower));
        assert!(!third.is_leader());
    }

    #[tokio::test]
    async fn test_middle_departure_rewires_chain() {
        let coordinator = MemoryCoordinator::new();
        let (first, _) = candidate(&coordinator).await;
        let (second, second_session) = candidate(&coordinator).await;
        let (third, _) = candidate(&coordinator).await;

        first.start();
        second.start();
        third.start();
        wait_for_role(&first, Role::Leader).await;
        wait_for_role(&third, Role::Follower).await;

        coordinator.expire_session(second_session.session_id());

        let expected = first.local_name().await;
        let mut rewired = false;
        for _ in 0..100 {
            if third.predecessor().await == expected {
                rewired = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        assert!(rewired, "Third candidate now watches the leader");
        assert!(first.is_leader());
        assert_eq!(third.current_role(), Some(Role::Follower));
    }

    #[tokio::test]
    async fn test_resign_hands_over_leadership() {
        let coordinator = MemoryCoordinator::new();
        let (leader, _) = candidate(&coordinator).await;
        let (successor, _) = candidate(&coordinator).await;

        leader.start();
        successor.start();
        wait_for_role(&leader, Role::Leader).await;
        wait_for_role(&successor, Role::Follower).await;

        leader.resign().await.unwrap();

        wait_for_role(&successor, Role::Leader).await;
        assert_eq!(leader.local_name().await, None);
    }
}
