//! SQL schema for the netloc SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS devices (
    device_id      TEXT PRIMARY KEY,
    hostname       TEXT NOT NULL COLLATE NOCASE UNIQUE,
    address        TEXT NOT NULL,
    dialect        TEXT NOT NULL,   -- 'generic' | 'huawei' | 'cisco'
    credentials    TEXT,
    community      TEXT,
    is_active      INTEGER NOT NULL DEFAULT 1,
    ssh_fallback   INTEGER NOT NULL DEFAULT 0,
    site_code      TEXT,
    info_json      TEXT NOT NULL DEFAULT '{}',
    created_at     TEXT NOT NULL,
    last_seen      TEXT,
    last_discovery TEXT
);

CREATE TABLE IF NOT EXISTS ports (
    port_id       TEXT PRIMARY KEY,
    device_id     TEXT NOT NULL REFERENCES devices(device_id),
    name          TEXT NOT NULL,
    port_index    INTEGER NOT NULL DEFAULT 0,   -- device ifIndex, 0 = unknown
    role          TEXT NOT NULL,
    vlan          INTEGER,
    neighbor_name TEXT,
    neighbor_type TEXT,
    address_count INTEGER NOT NULL DEFAULT 0,
    updated_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS addresses (
    mac            TEXT PRIMARY KEY,   -- canonical AA:BB:CC:DD:EE:FF
    vendor_hint    TEXT,
    endpoint_class TEXT,
    is_active      INTEGER NOT NULL DEFAULT 1,
    first_seen     TEXT NOT NULL,
    last_seen      TEXT NOT NULL
);

-- Superseded rows are flipped to is_current = 0, never re-pointed.
CREATE TABLE IF NOT EXISTS locations (
    location_id TEXT PRIMARY KEY,
    mac         TEXT NOT NULL REFERENCES addresses(mac),
    device_id   TEXT NOT NULL REFERENCES devices(device_id),
    port_id     TEXT NOT NULL REFERENCES ports(port_id),
    vlan        INTEGER NOT NULL,
    ip          TEXT,
    hostname    TEXT,
    is_current  INTEGER NOT NULL,
    first_seen  TEXT NOT NULL,
    last_seen   TEXT NOT NULL
);

-- Strictly append-only.
CREATE TABLE IF NOT EXISTS history (
    event_id       TEXT PRIMARY KEY,
    mac            TEXT NOT NULL REFERENCES addresses(mac),
    kind           TEXT NOT NULL,   -- 'new' | 'move' | 'disappear'
    from_device_id TEXT REFERENCES devices(device_id),
    from_port_id   TEXT REFERENCES ports(port_id),
    from_vlan      INTEGER,
    to_device_id   TEXT REFERENCES devices(device_id),
    to_port_id     TEXT REFERENCES ports(port_id),
    to_vlan        INTEGER,
    recorded_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS topology_links (
    link_id          TEXT PRIMARY KEY,
    local_device_id  TEXT NOT NULL REFERENCES devices(device_id),
    local_port_id    TEXT NOT NULL REFERENCES ports(port_id),
    remote_device_id TEXT NOT NULL REFERENCES devices(device_id),
    remote_port_id   TEXT REFERENCES ports(port_id),
    protocol         TEXT NOT NULL,
    discovered_at    TEXT NOT NULL,
    last_seen        TEXT NOT NULL,
    CHECK (local_device_id != remote_device_id)
);

CREATE TABLE IF NOT EXISTS discovery_logs (
    log_id        TEXT PRIMARY KEY,
    device_id     TEXT NOT NULL REFERENCES devices(device_id),
    method        TEXT NOT NULL,   -- 'snmp' | 'cli'
    status        TEXT NOT NULL,   -- 'success' | 'failed' | 'timeout'
    address_count INTEGER NOT NULL,
    error         TEXT,
    started_at    TEXT NOT NULL,
    completed_at  TEXT NOT NULL,
    duration_ms   INTEGER NOT NULL
);

-- At most one current location per address.
CREATE UNIQUE INDEX IF NOT EXISTS locations_current_uniq
    ON locations(mac) WHERE is_current = 1;

-- At most one link per unordered device pair.
CREATE UNIQUE INDEX IF NOT EXISTS links_pair_uniq
    ON topology_links(min(local_device_id, remote_device_id),
                      max(local_device_id, remote_device_id));

CREATE INDEX IF NOT EXISTS ports_device_idx      ON ports(device_id, port_index);
CREATE INDEX IF NOT EXISTS locations_device_idx  ON locations(device_id, is_current);
CREATE INDEX IF NOT EXISTS locations_port_idx    ON locations(port_id);
CREATE INDEX IF NOT EXISTS locations_mac_idx     ON locations(mac);
CREATE INDEX IF NOT EXISTS history_mac_idx       ON history(mac);
CREATE INDEX IF NOT EXISTS logs_started_idx      ON discovery_logs(started_at);

PRAGMA user_version = 1;
";
