//! Owner-or-admin checks gating destructive operations on user content.

use uuid::Uuid;

use crate::resp::jwt::SessionToken;
use crate::resp::problem::{problems, Problem};

/// Content that remembers which user created it.
pub trait Owned {
    fn owner(&self) -> Uuid;
}

#[inline]
pub fn may_modify(caller: Uuid, caller_is_admin: bool, owner: Uuid) -> bool {
    caller == owner || caller_is_admin
}

pub fn ensure_can_modify(
    caller: &SessionToken,
    item: &impl Owned,
    kind: &str,
) -> Result<(), Problem> {
    if may_modify(caller.user, caller.is_admin(), item.owner()) {
        return Ok(());
    }

    tracing::info!(
        "denied {} modification by {}, owned by {}",
        kind,
        caller.user,
        item.owner()
    );
    Err(problems::not_authorized(format!(
        "{} not owned by user.",
        kind
    )))
}

/// Course management and review moderation are reserved to admins.
pub fn ensure_admin(caller: &SessionToken) -> Result<(), Problem> {
    if caller.is_admin() {
        Ok(())
    } else {
        Err(problems::not_authorized("Admin access required."))
    }
}
