//! Object identifiers used by the collectors.

// ─── SNMPv2-MIB / IF-MIB ─────────────────────────────────────────────────────

pub const SYS_NAME: &[u32] = &[1, 3, 6, 1, 2, 1, 1, 5, 0];
pub const IF_DESCR: &[u32] = &[1, 3, 6, 1, 2, 1, 2, 2, 1, 2];
/// 1 = up, 2 = down.
pub const IF_OPER_STATUS: &[u32] = &[1, 3, 6, 1, 2, 1, 2, 2, 1, 8];
pub const IF_NAME: &[u32] = &[1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 1];

// ─── ENTITY-MIB ──────────────────────────────────────────────────────────────

pub const ENT_PHYSICAL_SERIAL: &[u32] = &[1, 3, 6, 1, 2, 1, 47, 1, 1, 1, 1, 11];
pub const ENT_PHYSICAL_MODEL: &[u32] = &[1, 3, 6, 1, 2, 1, 47, 1, 1, 1, 1, 13];

// ─── BRIDGE-MIB / Q-BRIDGE-MIB ───────────────────────────────────────────────

/// Index: bridge port number. Value: ifIndex.
pub const DOT1D_BASE_PORT_IF_INDEX: &[u32] = &[1, 3, 6, 1, 2, 1, 17, 1, 4, 1, 2];
/// Index: six MAC octets. Value: bridge port.
pub const DOT1D_TP_FDB_PORT: &[u32] = &[1, 3, 6, 1, 2, 1, 17, 4, 3, 1, 2];
/// Index: FDB id (VLAN) then six MAC octets. Value: bridge port.
pub const DOT1Q_TP_FDB_PORT: &[u32] = &[1, 3, 6, 1, 2, 1, 17, 7, 1, 2, 2, 1, 2];
pub const DOT1Q_VLAN_STATIC_NAME: &[u32] = &[1, 3, 6, 1, 2, 1, 17, 7, 1, 4, 3, 1, 1];

// ─── LLDP-MIB ────────────────────────────────────────────────────────────────

/// `lldpRemEntry`; instances are `column.timeMark.localPortNum.index`.
pub const LLDP_REM_ENTRY: &[u32] = &[1, 0, 8802, 1, 1, 2, 1, 4, 1, 1];
pub const LLDP_REM_CHASSIS_ID: u32 = 5;
pub const LLDP_REM_PORT_ID: u32 = 7;
pub const LLDP_REM_PORT_DESC: u32 = 8;
pub const LLDP_REM_SYS_NAME: u32 = 9;
pub const LLDP_REM_SYS_CAP_SUPPORTED: u32 = 11;
pub const LLDP_REM_SYS_CAP_ENABLED: u32 = 12;

/// `lldpRemManAddrIfSubtype`; the address itself lives in the index.
pub const LLDP_REM_MAN_ADDR_IF_SUBTYPE: &[u32] = &[1, 0, 8802, 1, 1, 2, 1, 4, 2, 1, 3];
/// `lldpLocPortId`, indexed by `localPortNum`.
pub const LLDP_LOC_PORT_ID: &[u32] = &[1, 0, 8802, 1, 1, 2, 1, 3, 7, 1, 3];

// ─── Huawei private ──────────────────────────────────────────────────────────

/// `hwDynFdbPort`. Index: six MAC octets, VLAN, then VSI/BD arcs. Value:
/// ifIndex.
pub const HW_DYN_FDB_PORT: &[u32] = &[1, 3, 6, 1, 4, 1, 2011, 5, 25, 42, 2, 1, 3, 1, 4];

pub const HW_LLDP_REM_PORT_ID: &[u32] = &[1, 3, 6, 1, 4, 1, 2011, 5, 25, 134, 1, 1, 1, 1, 4];
pub const HW_LLDP_REM_SYS_NAME: &[u32] = &[1, 3, 6, 1, 4, 1, 2011, 5, 25, 134, 1, 1, 1, 1, 6];
pub const HW_LLDP_REM_MAN_ADDR: &[u32] = &[1, 3, 6, 1, 4, 1, 2011, 5, 25, 134, 1, 1, 1, 1, 9];
