//! Authorization - Role and permission gating for procedures
//!
//! A procedure declares what it requires; the checker computes five
//! independent axes against chain state: identity presence, account
//! freeze, roles, signing-key permissions, agent-group permissions.

use crate::error::{Error, Result};
use ledger_client::ChainClient;
use ledger_types::{AccountAddress, Permissions, RequiredPermissions, Role, TxTag};

/// What a procedure requires of its caller.
#[derive(Debug, Clone)]
pub enum ProcedureAuthorization {
    /// Anyone with an identity may run this.
    Allowed,
    /// Nobody may run this; the message explains why.
    Forbidden(String),
    /// Specific roles and/or permissions are required.
    Requirements(AuthorizationRequirements),
}

impl ProcedureAuthorization {
    pub fn roles(roles: impl IntoIterator<Item = Role>) -> Self {
        ProcedureAuthorization::Requirements(AuthorizationRequirements {
            roles: Some(roles.into_iter().collect()),
            permissions: None,
        })
    }

    pub fn permissions(permissions: RequiredPermissions) -> Self {
        ProcedureAuthorization::Requirements(AuthorizationRequirements {
            roles: None,
            permissions: Some(permissions),
        })
    }

    pub fn roles_and_permissions(
        roles: impl IntoIterator<Item = Role>,
        permissions: RequiredPermissions,
    ) -> Self {
        ProcedureAuthorization::Requirements(AuthorizationRequirements {
            roles: Some(roles.into_iter().collect()),
            permissions: Some(permissions),
        })
    }
}

/// Role and permission requirements. `None` means unrestricted.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationRequirements {
    pub roles: Option<Vec<Role>>,
    pub permissions: Option<RequiredPermissions>,
}

/// Outcome of one permission axis.
#[derive(Debug, Clone)]
pub struct PermissionCheck {
    pub satisfied: bool,
    pub missing: Option<RequiredPermissions>,
}

impl PermissionCheck {
    fn pass() -> Self {
        Self {
            satisfied: true,
            missing: None,
        }
    }

    fn fail(missing: RequiredPermissions) -> Self {
        Self {
            satisfied: false,
            missing: Some(missing),
        }
    }
}

/// Outcome of the role axis.
#[derive(Debug, Clone)]
pub struct RoleCheck {
    pub satisfied: bool,
    pub message: Option<String>,
    pub missing: Vec<Role>,
}

impl RoleCheck {
    fn pass() -> Self {
        Self {
            satisfied: true,
            message: None,
            missing: Vec::new(),
        }
    }
}

/// All five axes, always computed.
#[derive(Debug, Clone)]
pub struct AuthorizationOutcome {
    pub agent_permissions: PermissionCheck,
    pub signer_permissions: PermissionCheck,
    pub roles: RoleCheck,
    pub account_frozen: bool,
    pub no_identity: bool,
}

impl AuthorizationOutcome {
    pub fn authorized(&self) -> bool {
        !self.no_identity
            && !self.account_frozen
            && self.roles.satisfied
            && self.signer_permissions.satisfied
            && self.agent_permissions.satisfied
    }
}

/// Compute every authorization axis for `signer`.
///
/// A requirement naming more than one distinct asset is a procedure
/// contract violation and raises `Error::General`.
pub async fn check_authorization(
    auth: &ProcedureAuthorization,
    signer: &AccountAddress,
    chain: &dyn ChainClient,
) -> Result<AuthorizationOutcome> {
    let identity = chain.identity_of(signer).await?;
    let no_identity = identity.is_none();

    let account_frozen = match &identity {
        Some(identity) => {
            let primary = chain.primary_key(identity).await.ok();
            let is_primary = primary.as_ref() == Some(signer);
            !is_primary && chain.secondary_keys_frozen(identity).await?
        }
        None => false,
    };

    let requirements = match auth {
        ProcedureAuthorization::Allowed => AuthorizationRequirements::default(),
        ProcedureAuthorization::Forbidden(message) => {
            return Ok(AuthorizationOutcome {
                agent_permissions: PermissionCheck::pass(),
                signer_permissions: PermissionCheck::pass(),
                roles: RoleCheck {
                    satisfied: false,
                    message: Some(message.clone()),
                    missing: Vec::new(),
                },
                account_frozen,
                no_identity,
            });
        }
        ProcedureAuthorization::Requirements(reqs) => reqs.clone(),
    };

    let roles = match &requirements.roles {
        None => RoleCheck::pass(),
        Some(required) => {
            // Without an identity, role checks trivially fail.
            let mut missing = Vec::new();
            if let Some(identity) = &identity {
                for role in required {
                    if !chain.has_role(identity, role).await? {
                        missing.push(role.clone());
                    }
                }
            } else {
                missing = required.clone();
            }
            RoleCheck {
                satisfied: missing.is_empty(),
                message: None,
                missing,
            }
        }
    };

    let (signer_permissions, agent_permissions) = match &requirements.permissions {
        None => (PermissionCheck::pass(), PermissionCheck::pass()),
        Some(required) => {
            let assets = required.distinct_assets();
            if assets.len() > 1 {
                return Err(Error::General(format!(
                    "procedure declares permissions over {} distinct assets; \
                     cross-asset permission sets are never allowed",
                    assets.len()
                )));
            }

            let held = chain.key_permissions(signer).await?;
            let signer_check = check_key_permissions(&held, required);

            let agent_check = match (assets.first().copied(), &required.transactions) {
                (Some(asset), Some(transactions)) => {
                    let held = match &identity {
                        Some(identity) => chain.agent_permissions(identity, asset).await?,
                        None => None,
                    };
                    check_agent_permissions(held.as_ref(), asset, transactions)
                }
                _ => PermissionCheck::pass(),
            };

            (signer_check, agent_check)
        }
    };

    Ok(AuthorizationOutcome {
        agent_permissions,
        signer_permissions,
        roles,
        account_frozen,
        no_identity,
    })
}

fn check_key_permissions(held: &Permissions, required: &RequiredPermissions) -> PermissionCheck {
    let mut missing = RequiredPermissions::default();

    if let Some(tags) = &required.transactions {
        let absent = held.transactions.missing_from(tags);
        if !absent.is_empty() {
            missing.transactions = Some(absent);
        }
    }
    if let Some(assets) = &required.assets {
        let absent = held.assets.missing_from(assets);
        if !absent.is_empty() {
            missing.assets = Some(absent);
        }
    }
    if let Some(portfolios) = &required.portfolios {
        let absent = held.portfolios.missing_from(portfolios);
        if !absent.is_empty() {
            missing.portfolios = Some(absent);
        }
    }

    if missing.is_empty() {
        PermissionCheck::pass()
    } else {
        PermissionCheck::fail(missing)
    }
}

fn check_agent_permissions(
    held: Option<&Permissions>,
    asset: &ledger_types::AssetId,
    transactions: &[TxTag],
) -> PermissionCheck {
    match held {
        Some(permissions) => {
            let absent = permissions.transactions.missing_from(transactions);
            if absent.is_empty() {
                PermissionCheck::pass()
            } else {
                PermissionCheck::fail(RequiredPermissions {
                    transactions: Some(absent),
                    assets: Some(vec![asset.clone()]),
                    portfolios: None,
                })
            }
        }
        // Not an agent of the asset at all.
        None => PermissionCheck::fail(RequiredPermissions {
            transactions: Some(transactions.to_vec()),
            assets: Some(vec![asset.clone()]),
            portfolios: None,
        }),
    }
}
