//! PostgreSQL type names classified into marshaling categories and driver tags.
//! Total over all inputs: an unknown name is `Other` / `DriverType::Unknown` and passes through as text.

/// Semantic category driving parameter parsing and result serialization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeCategory {
    Numeric,
    Text,
    Boolean,
    Date,
    DateTime,
    Json,
    Binary,
    Other,
}

/// Driver-level tag: which typed value a parameter of this type is reduced to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DriverType {
    Smallint,
    Integer,
    Bigint,
    Real,
    Double,
    Numeric,
    Money,
    Oid,
    Boolean,
    Text,
    Varchar,
    Char,
    Name,
    Citext,
    Xml,
    Json,
    Jsonb,
    JsonPath,
    Bytea,
    Date,
    Time,
    TimeTz,
    Timestamp,
    TimestampTz,
    Interval,
    Uuid,
    Inet,
    Cidr,
    MacAddr,
    MacAddr8,
    Bit,
    Varbit,
    TsVector,
    TsQuery,
    Geometric,
    Range,
    MultiRange,
    Hstore,
    RegObject,
    TransactionId,
    PgLsn,
    Refcursor,
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeDescriptor {
    /// Name as received from the catalog (e.g. `character varying[]`).
    pub original: String,
    /// Normalized base name without array suffix, typmod, quotes or `pg_catalog.` prefix.
    pub base: String,
    pub category: TypeCategory,
    pub driver: DriverType,
    pub is_array: bool,
}

impl TypeDescriptor {
    pub fn parse(name: &str) -> Self {
        let (base, is_array) = normalize(name);
        let (category, driver) = classify(&base);
        TypeDescriptor {
            original: name.to_string(),
            base,
            category,
            driver,
            is_array,
        }
    }

    /// Same type with the array flag cleared; used to parse array elements.
    pub fn element(&self) -> TypeDescriptor {
        TypeDescriptor {
            is_array: false,
            ..self.clone()
        }
    }

    pub fn is_text(&self) -> bool {
        self.category == TypeCategory::Text
    }

    pub fn is_json(&self) -> bool {
        self.category == TypeCategory::Json
    }
}

/// Lowercase, drop quotes, `pg_catalog.` prefix and typmods; strip trailing `[]` groups.
fn normalize(name: &str) -> (String, bool) {
    let mut s = name.trim().to_lowercase().replace('"', "");
    let mut is_array = false;
    while s.ends_with(']') {
        match s.rfind('[') {
            Some(open) => {
                s.truncate(open);
                s = s.trim_end().to_string();
                is_array = true;
            }
            None => break,
        }
    }
    let mut out = String::with_capacity(s.len());
    let mut depth = 0u32;
    for c in s.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    let collapsed = out.split_whitespace().collect::<Vec<_>>().join(" ");
    let base = collapsed
        .strip_prefix("pg_catalog.")
        .map(str::to_string)
        .unwrap_or(collapsed);
    (base, is_array)
}

fn classify(base: &str) -> (TypeCategory, DriverType) {
    use DriverType as D;
    use TypeCategory as C;
    match base {
        "smallint" | "int2" | "smallserial" | "serial2" => (C::Numeric, D::Smallint),
        "integer" | "int" | "int4" | "serial" | "serial4" => (C::Numeric, D::Integer),
        "bigint" | "int8" | "bigserial" | "serial8" => (C::Numeric, D::Bigint),
        "real" | "float4" => (C::Numeric, D::Real),
        "double precision" | "float8" | "float" => (C::Numeric, D::Double),
        "numeric" | "decimal" => (C::Numeric, D::Numeric),
        "money" => (C::Numeric, D::Money),
        "oid" => (C::Numeric, D::Oid),

        "boolean" | "bool" => (C::Boolean, D::Boolean),

        "text" => (C::Text, D::Text),
        "character varying" | "varchar" => (C::Text, D::Varchar),
        "character" | "char" | "bpchar" => (C::Text, D::Char),
        "name" => (C::Text, D::Name),
        "citext" => (C::Text, D::Citext),
        "xml" => (C::Text, D::Xml),

        "json" => (C::Json, D::Json),
        "jsonb" => (C::Json, D::Jsonb),

        "bytea" => (C::Binary, D::Bytea),

        "date" => (C::Date, D::Date),

        "time" | "time without time zone" => (C::DateTime, D::Time),
        "timetz" | "time with time zone" => (C::DateTime, D::TimeTz),
        "timestamp" | "timestamp without time zone" => (C::DateTime, D::Timestamp),
        "timestamptz" | "timestamp with time zone" => (C::DateTime, D::TimestampTz),
        "interval" => (C::DateTime, D::Interval),

        "uuid" => (C::Other, D::Uuid),
        "inet" => (C::Other, D::Inet),
        "cidr" => (C::Other, D::Cidr),
        "macaddr" => (C::Other, D::MacAddr),
        "macaddr8" => (C::Other, D::MacAddr8),
        "bit" => (C::Other, D::Bit),
        "bit varying" | "varbit" => (C::Other, D::Varbit),
        "tsvector" => (C::Other, D::TsVector),
        "tsquery" => (C::Other, D::TsQuery),
        "jsonpath" => (C::Other, D::JsonPath),
        "point" | "line" | "lseg" | "box" | "path" | "polygon" | "circle" => (C::Other, D::Geometric),
        "int4range" | "int8range" | "numrange" | "tsrange" | "tstzrange" | "daterange" => {
            (C::Other, D::Range)
        }
        "int4multirange" | "int8multirange" | "nummultirange" | "tsmultirange" | "tstzmultirange"
        | "datemultirange" => (C::Other, D::MultiRange),
        "hstore" => (C::Other, D::Hstore),
        "regclass" | "regtype" | "regproc" | "regprocedure" | "regoper" | "regoperator" | "regconfig"
        | "regdictionary" | "regnamespace" | "regrole" | "regcollation" => (C::Other, D::RegObject),
        "xid" | "xid8" | "cid" | "tid" | "txid_snapshot" | "pg_snapshot" => (C::Other, D::TransactionId),
        "pg_lsn" => (C::Other, D::PgLsn),
        "refcursor" => (C::Other, D::Refcursor),
        _ => (C::Other, D::Unknown),
    }
}
