//! 权限解析
//!
//! 根据会话角色一次性解析出允许的操作集合，所有视图统一据此决定
//! 导航项和字段可见性，不再分散判断角色。

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use surgence_core::{Role, Session, SurgenceError};

/// 可授予的操作
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ViewStatusBoard,
    NavigateBoardDates,
    ViewDashboard,
    ViewPatients,
    ViewPatientIdentity,
    AddPatient,
    UseChat,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ViewStatusBoard => "view_status_board",
            Self::NavigateBoardDates => "navigate_board_dates",
            Self::ViewDashboard => "view_dashboard",
            Self::ViewPatients => "view_patients",
            Self::ViewPatientIdentity => "view_patient_identity",
            Self::AddPatient => "add_patient",
            Self::UseChat => "use_chat",
        }
    }
}

/// 已解析的权限集合
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CapabilitySet {
    role: Role,
    granted: BTreeSet<Capability>,
}

impl CapabilitySet {
    pub fn for_role(role: Role) -> Self {
        use Capability::*;

        let granted: &[Capability] = match role {
            Role::Guest => &[ViewStatusBoard, UseChat],
            Role::SurgicalTeam => &[
                ViewStatusBoard,
                UseChat,
                NavigateBoardDates,
                ViewDashboard,
                ViewPatients,
                ViewPatientIdentity,
            ],
            Role::Admin => &[
                ViewStatusBoard,
                UseChat,
                NavigateBoardDates,
                ViewDashboard,
                ViewPatients,
                ViewPatientIdentity,
                AddPatient,
            ],
        };

        Self {
            role,
            granted: granted.iter().copied().collect(),
        }
    }

    /// 未登录的会话一律按访客处理
    pub fn for_session(session: &Session) -> Self {
        if session.is_authenticated() {
            Self::for_role(session.role)
        } else {
            Self::for_role(Role::Guest)
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn allows(&self, capability: Capability) -> bool {
        self.granted.contains(&capability)
    }

    /// 要求具备某项权限，否则返回权限错误
    pub fn require(&self, capability: Capability) -> surgence_core::Result<()> {
        if self.allows(capability) {
            Ok(())
        } else {
            Err(SurgenceError::Permission(format!(
                "{} is not permitted for role {}",
                capability.as_str(),
                self.role
            )))
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.granted.iter().copied()
    }

    /// 角色徽标
    pub fn badge(&self) -> &'static str {
        match self.role {
            Role::Admin => "ADMIN",
            Role::SurgicalTeam => "SURGICAL TEAM",
            Role::Guest => "GUEST",
        }
    }

    /// 当前会话可见的导航项
    pub fn nav_items(&self) -> Vec<NavItem> {
        NAV_ITEMS
            .iter()
            .filter(|item| item.requires.map_or(true, |c| self.allows(c)))
            .cloned()
            .collect()
    }
}

/// 导航项
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NavItem {
    pub href: &'static str,
    pub label: &'static str,
    #[serde(skip)]
    pub requires: Option<Capability>,
}

const NAV_ITEMS: &[NavItem] = &[
    NavItem { href: "/", label: "Home", requires: None },
    NavItem { href: "/status-board", label: "Status Board", requires: Some(Capability::ViewStatusBoard) },
    NavItem { href: "/dashboard", label: "Dashboard", requires: Some(Capability::ViewDashboard) },
    NavItem { href: "/patients", label: "Patients", requires: Some(Capability::ViewPatients) },
    NavItem { href: "/add-patient", label: "Add Patient", requires: Some(Capability::AddPatient) },
    NavItem { href: "/chat", label: "Chat", requires: Some(Capability::UseChat) },
];

#[cfg(test)]
mod tests {
    use super::*;
    use surgence_core::LoginResponse;

    #[test]
    fn test_guest_is_limited_to_public_views() {
        let caps = CapabilitySet::for_role(Role::Guest);
        assert!(caps.allows(Capability::ViewStatusBoard));
        assert!(!caps.allows(Capability::NavigateBoardDates));
        assert!(!caps.allows(Capability::AddPatient));
        assert!(caps.require(Capability::ViewPatients).is_err());

        let hrefs: Vec<_> = caps.nav_items().iter().map(|i| i.href).collect();
        assert_eq!(hrefs, vec!["/", "/status-board", "/chat"]);
    }

    #[test]
    fn test_surgical_team_cannot_add_patients() {
        let caps = CapabilitySet::for_role(Role::SurgicalTeam);
        assert!(caps.allows(Capability::NavigateBoardDates));
        assert!(caps.allows(Capability::ViewPatientIdentity));
        assert!(!caps.allows(Capability::AddPatient));
        assert_eq!(caps.badge(), "SURGICAL TEAM");
    }

    #[test]
    fn test_admin_has_everything() {
        let caps = CapabilitySet::for_role(Role::Admin);
        assert_eq!(caps.iter().count(), 7);
        assert!(caps.require(Capability::AddPatient).is_ok());
        assert_eq!(caps.nav_items().len(), NAV_ITEMS.len());
    }

    #[test]
    fn test_session_without_token_resolves_as_guest() {
        let mut session = Session::guest();
        session.role = Role::Admin;
        assert_eq!(CapabilitySet::for_session(&session).role(), Role::Guest);

        let session = Session::from_login(
            "team@hospital.org",
            LoginResponse {
                access_token: "t".to_string(),
                token_type: "bearer".to_string(),
                role: Role::SurgicalTeam,
            },
        );
        assert_eq!(CapabilitySet::for_session(&session).role(), Role::SurgicalTeam);
    }
}
