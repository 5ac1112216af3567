use super::SECTION_SIZE;

/// L1 slots a process page directory covers. The hardware directory has
/// 4096 entries; user directories keep only the first 1024 so they fit in
/// a single page, which caps user virtual addresses at 1 GiB.
pub const N_PD_ENTRIES: usize = 1024;

/// Entries in the full hardware directory, used only by the live kernel
/// translation table.
pub const KPD_ENTRIES: usize = 4096;

/// Upper bound of user virtual addresses.
pub const USERBOUND: usize = N_PD_ENTRIES * SECTION_SIZE;
