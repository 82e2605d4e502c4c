use meritsim::db::DbPool;
use meritsim::seed::{self, AdminSeed};

use crate::output::{self, OutputConfig};

/// Seeds reference data and the admins configured in `ADMIN_EMAIL_n` / `ADMIN_PASS_n`
pub fn seed(pool: &DbPool, config: &OutputConfig) -> Result<(), Box<dyn std::error::Error>> {
    let admins = seed::admins_from_env(|key| std::env::var(key).ok());
    let report = seed::seed_database(pool, &admins)?;
    output::print_seed_report(&report, config);
    Ok(())
}

/// Creates one administrator, leaving an existing account untouched
pub fn create_admin(
    pool: &DbPool,
    email: String,
    password: String,
    full_name: Option<String>,
    config: &OutputConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let (user, created) = seed::create_admin(pool, &AdminSeed { email, password, full_name })?;
    if !created {
        output::print_success(&format!("{} already exists", user.get_email()), config);
        return Ok(());
    }
    output::print_user(&user, config);
    Ok(())
}
