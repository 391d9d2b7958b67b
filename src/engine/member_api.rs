use super::Engine;

use async_trait::async_trait;

use crate::{api::MemberAPI, auth::User, entities::Member, error::Error};

#[async_trait]
impl MemberAPI for Engine {
    /// Records the caller in the member directory. Registering twice returns
    /// the existing entry untouched.
    #[tracing::instrument(skip(self))]
    async fn register_member(&self, user: User) -> Result<Member, Error> {
        if let Some(member) = self.store.find_member(user.id).await? {
            return Ok(member);
        }

        let member = Member::new(user.id, user.role);

        self.store.save_member(&member).await?;

        tracing::info!(member_id = %member.id, role = member.role.name(), "member registered");

        Ok(member)
    }
}
