pub const SCHEMA_VERSION: i32 = 2;

pub const SCHEMA_V1: &str = r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    id INTEGER PRIMARY KEY,
    version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS customers (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT,
    mobile_number TEXT,
    pan_card_number TEXT,
    date_of_birth TEXT,
    customer_type TEXT NOT NULL DEFAULT 'retail',
    status TEXT NOT NULL DEFAULT 'active',
    family_group_id TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- family_head_id has no foreign key: the head row and the group are written
-- in the same transaction and the group owns the member rows.
CREATE TABLE IF NOT EXISTS family_groups (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    family_head_id TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'active',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- customer_id is UNIQUE: a customer belongs to at most one group.
CREATE TABLE IF NOT EXISTS family_members (
    id TEXT PRIMARY KEY,
    family_group_id TEXT NOT NULL,
    customer_id TEXT NOT NULL UNIQUE,
    relationship TEXT,
    is_head INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'active',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    FOREIGN KEY (family_group_id) REFERENCES family_groups(id) ON DELETE CASCADE,
    FOREIGN KEY (customer_id) REFERENCES customers(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS customer_insurances (
    id TEXT PRIMARY KEY,
    customer_id TEXT NOT NULL,
    policy_no TEXT NOT NULL,
    registration_no TEXT,
    issue_date TEXT,
    start_date TEXT,
    expired_date TEXT,
    insurance_company TEXT,
    branch TEXT,
    broker TEXT,
    relationship_manager TEXT,
    premium_type TEXT,
    policy_type TEXT,
    od_premium TEXT NOT NULL DEFAULT '0',
    tp_premium TEXT NOT NULL DEFAULT '0',
    net_premium TEXT NOT NULL DEFAULT '0',
    gst TEXT NOT NULL DEFAULT '0',
    final_premium TEXT NOT NULL DEFAULT '0',
    commission_on TEXT NOT NULL DEFAULT 'net_premium',
    my_commission_percentage TEXT NOT NULL DEFAULT '0',
    my_commission_amount TEXT NOT NULL DEFAULT '0',
    transfer_commission_percentage TEXT NOT NULL DEFAULT '0',
    transfer_commission_amount TEXT NOT NULL DEFAULT '0',
    actual_earnings TEXT NOT NULL DEFAULT '0',
    status TEXT NOT NULL DEFAULT 'active',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    FOREIGN KEY (customer_id) REFERENCES customers(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS quotations (
    id TEXT PRIMARY KEY,
    customer_id TEXT NOT NULL,
    vehicle_number TEXT,
    make_model_variant TEXT,
    rto_location TEXT,
    manufacturing_year INTEGER,
    fuel_type TEXT,
    idv_vehicle TEXT,
    idv_trailer TEXT,
    idv_cng_lpg_kit TEXT,
    idv_electrical_accessories TEXT,
    idv_non_electrical_accessories TEXT,
    total_idv TEXT NOT NULL DEFAULT '0',
    status TEXT NOT NULL DEFAULT 'draft',
    notes TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    FOREIGN KEY (customer_id) REFERENCES customers(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS quotation_companies (
    id TEXT PRIMARY KEY,
    quotation_id TEXT NOT NULL,
    insurance_company TEXT NOT NULL,
    plan_name TEXT,
    quote_number TEXT,
    basic_od_premium TEXT NOT NULL DEFAULT '0',
    tp_premium TEXT NOT NULL DEFAULT '0',
    cng_lpg_premium TEXT NOT NULL DEFAULT '0',
    idv_vehicle TEXT,
    idv_trailer TEXT,
    idv_cng_lpg_kit TEXT,
    idv_electrical_accessories TEXT,
    idv_non_electrical_accessories TEXT,
    total_idv TEXT NOT NULL DEFAULT '0',
    addon_covers TEXT NOT NULL DEFAULT '{}',
    total_addon_premium TEXT NOT NULL DEFAULT '0',
    net_premium TEXT NOT NULL DEFAULT '0',
    sgst_amount TEXT NOT NULL DEFAULT '0',
    cgst_amount TEXT NOT NULL DEFAULT '0',
    total_premium TEXT NOT NULL DEFAULT '0',
    final_premium TEXT NOT NULL DEFAULT '0',
    is_recommended INTEGER NOT NULL DEFAULT 0,
    recommendation_note TEXT,
    ranking INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (quotation_id) REFERENCES quotations(id) ON DELETE CASCADE
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_customer_name ON customers(name);
CREATE INDEX IF NOT EXISTS idx_customer_family ON customers(family_group_id);
CREATE INDEX IF NOT EXISTS idx_customer_email ON customers(email);
CREATE INDEX IF NOT EXISTS idx_family_member_group ON family_members(family_group_id);
CREATE INDEX IF NOT EXISTS idx_family_member_head ON family_members(family_group_id, is_head);
CREATE INDEX IF NOT EXISTS idx_policy_customer ON customer_insurances(customer_id);
CREATE INDEX IF NOT EXISTS idx_policy_expired ON customer_insurances(expired_date);
CREATE INDEX IF NOT EXISTS idx_quotation_customer ON quotations(customer_id);
CREATE INDEX IF NOT EXISTS idx_quotation_company_quote ON quotation_companies(quotation_id);
"#;

/// V2 migration: key/value settings (GST rates and similar).
pub const MIGRATION_V2: &str = r#"
CREATE TABLE IF NOT EXISTS app_settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Migrations in order; entry `i` upgrades the schema to version `i + 1`.
pub const MIGRATIONS: &[&str] = &[SCHEMA_V1, MIGRATION_V2];
