use tracing::warn;

use crate::ports::{IdentityResolver, StoreError};
use crate::types::{Apartment, User};

/// Apartment and user resolved for one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub apartment: Apartment,
    pub user: User,
}

/// Runs both lookups concurrently and waits for both.
///
/// A rejected lookup fails the join. A lookup that never completes stalls
/// the caller; no timeout is applied here.
pub async fn resolve_identity<R>(resolver: &R) -> Result<ResolvedIdentity, StoreError>
where
    R: IdentityResolver + ?Sized,
{
    let joined = tokio::try_join!(resolver.resolve_apartment(), resolver.resolve_user());
    match joined {
        Ok((apartment, user)) => Ok(ResolvedIdentity { apartment, user }),
        Err(err) => {
            warn!(stage = "identity", error = %err, "failed to resolve apartment or user");
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::*;
    use crate::types::{ApartmentId, UserId};

    /// Apartment lookup only finishes once the user lookup has started.
    #[derive(Default)]
    struct InterlockedResolver {
        user_started: Notify,
        fail_user: bool,
    }

    #[async_trait]
    impl IdentityResolver for InterlockedResolver {
        async fn resolve_apartment(&self) -> Result<Apartment, StoreError> {
            self.user_started.notified().await;
            Ok(Apartment {
                id: ApartmentId::new("apt-1"),
                name: "Maple St".into(),
                tenant_ids: vec![UserId::new("user-1")],
            })
        }

        async fn resolve_user(&self) -> Result<User, StoreError> {
            self.user_started.notify_one();
            if self.fail_user {
                return Err(StoreError::NotFound("user-1".into()));
            }
            Ok(User {
                id: UserId::new("user-1"),
                display_name: "Alex".into(),
            })
        }
    }

    #[tokio::test]
    async fn lookups_run_concurrently() {
        let resolver = InterlockedResolver::default();

        let identity = tokio::time::timeout(Duration::from_secs(1), resolve_identity(&resolver))
            .await
            .expect("joined lookups should not deadlock")
            .expect("both lookups succeed");

        assert_eq!(identity.apartment.id().as_str(), "apt-1");
        assert_eq!(identity.user.id().as_str(), "user-1");
    }

    #[tokio::test]
    async fn rejected_lookup_fails_the_join() {
        let resolver = InterlockedResolver {
            fail_user: true,
            ..Default::default()
        };

        let err = tokio::time::timeout(Duration::from_secs(1), resolve_identity(&resolver))
            .await
            .expect("join completes")
            .unwrap_err();

        assert_eq!(err, StoreError::NotFound("user-1".into()));
    }
}
