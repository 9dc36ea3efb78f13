use strum_macros::{AsRefStr, Display};

#[derive(Debug, Copy, Clone, Eq, PartialEq, AsRefStr, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    Admin = 1,
    Management = 2,
    Staff = 3,
    Doctor = 4,
    Paramedic = 5,
    Treasury = 6,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::Admin),
            2 => Some(Role::Management),
            3 => Some(Role::Staff),
            4 => Some(Role::Doctor),
            5 => Some(Role::Paramedic),
            6 => Some(Role::Treasury),
            _ => None,
        }
    }

    pub fn id(self) -> u8 {
        self as u8
    }

    /// Create, edit and enable/disable work locations.
    pub fn manages_work_locations(self) -> bool {
        matches!(self, Role::Admin | Role::Management)
    }

    /// See and filter attendance of other users.
    pub fn views_all_attendance(self) -> bool {
        matches!(self, Role::Admin | Role::Management)
    }

    /// The admin account is a system operator, not a shift worker.
    pub fn records_attendance(self) -> bool {
        self != Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Role; 6] = [
        Role::Admin,
        Role::Management,
        Role::Staff,
        Role::Doctor,
        Role::Paramedic,
        Role::Treasury,
    ];

    #[test]
    fn ids_round_trip() {
        for role in ALL {
            assert_eq!(Role::from_id(role.id()), Some(role));
        }
        assert_eq!(Role::from_id(0), None);
        assert_eq!(Role::from_id(7), None);
    }

    #[test]
    fn only_admin_and_management_manage_sites() {
        let managers: Vec<Role> = ALL.into_iter().filter(|r| r.manages_work_locations()).collect();
        assert_eq!(managers, vec![Role::Admin, Role::Management]);
        assert!(!Role::Doctor.views_all_attendance());
        assert!(Role::Management.views_all_attendance());
    }

    #[test]
    fn clinical_roles_record_attendance() {
        assert!(Role::Paramedic.records_attendance());
        assert!(Role::Treasury.records_attendance());
        assert!(!Role::Admin.records_attendance());
        assert_eq!(Role::Paramedic.to_string(), "paramedic");
    }
}
