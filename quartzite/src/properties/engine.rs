use enumset::EnumSetType;
use strum_macros::AsRefStr;

/// Execution engine a group's physical forms may target.
///
/// Storage engine runs pushed down scans, filters and limits, but can't run operators which need
/// to see all rows first, such as sort. So enforcers are only placed in coordinator groups.
#[derive(EnumSetType, Debug, Hash, AsRefStr, Default)]
pub enum EngineKind {
    #[default]
    Coordinator,
    Storage,
}

impl EngineKind {
    /// Only the coordinator engine may run operators inserted by enforcers.
    pub fn can_enforce(&self) -> bool {
        matches!(self, EngineKind::Coordinator)
    }
}
