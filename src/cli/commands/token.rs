use clap::Args;
use serde_json::json;
use uuid::Uuid;

use crate::auth::{generate_jwt, Claims};
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config;
use crate::types::{Role, TenantId};

#[derive(Args)]
pub struct TokenArgs {
    #[arg(help = "Tenant identifier")]
    pub tenant: String,

    #[arg(long, help = "User id (random if omitted)")]
    pub user: Option<Uuid>,

    #[arg(long, default_value = "member", help = "Role: admin, procurement_officer or member")]
    pub role: String,

    #[arg(long, help = "Lifetime in hours (defaults to the configured expiry)")]
    pub hours: Option<u64>,
}

pub async fn handle(args: TokenArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let security = &config::config().security;
    let tenant = TenantId::new(args.tenant);
    let user_id = args.user.unwrap_or_else(Uuid::new_v4);
    let role = Role::parse(&args.role);
    let hours = args.hours.unwrap_or(security.jwt_expiry_hours);

    let claims = Claims::new(&tenant, user_id, role, hours);
    let token = generate_jwt(&claims, &security.jwt_secret)?;

    match output_format {
        OutputFormat::Text => println!("{}", token),
        OutputFormat::Json => output_success(
            &output_format,
            "Token issued",
            Some(json!({
                "token": token,
                "tenant": tenant,
                "user_id": user_id,
                "role": role.as_str(),
                "expires_at": claims.exp,
            })),
        )?,
    }
    Ok(())
}
