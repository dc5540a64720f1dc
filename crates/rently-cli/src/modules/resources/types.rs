#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    House,
    Room,
    Contract,
    Invoice,
    Tenant,
}

impl Resource {
    pub const fn path(self) -> &'static str {
        match self {
            Self::House => "/houses",
            Self::Room => "/rooms",
            Self::Contract => "/contracts",
            Self::Invoice => "/invoices",
            Self::Tenant => "/tenants",
        }
    }

    pub fn item_path(self, id: &str) -> String {
        format!("{}/{}", self.path(), id.trim_matches('/'))
    }
}
