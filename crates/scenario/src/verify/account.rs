use campus_client::MeResponse;
use campus_core::accounts::UserAccount;
use campus_core::failure::Failure;

use super::check_field;

/// The "who am I" reply must name the logged-in account with the right role.
pub fn verify_me(response: &MeResponse, account: &UserAccount) -> Result<(), Failure> {
    check_field("user", "code", &account.code, &response.code)?;
    check_field("user", "is_admin", &account.is_admin, &response.is_admin)
}
