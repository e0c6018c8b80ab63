use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Date format used in CSV files, the database and JSON output
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Card transaction owned by one client.
/// Every descriptive field is optional: the source data has gaps and the
/// report builders decide per aggregate which fields they need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Store-assigned row id (0 until inserted)
    pub id: i64,

    #[serde(rename = "fecha")]
    pub date: Option<NaiveDate>,

    #[serde(rename = "comercio")]
    pub merchant: Option<String>,

    /// Merchant business category ("giro comercio")
    #[serde(rename = "giro_comercio")]
    pub category: Option<String>,

    /// Sale channel, e.g. "fisica" / "digital"
    #[serde(rename = "tipo_venta")]
    pub sale_type: Option<String>,

    #[serde(rename = "monto")]
    pub amount: Option<f64>,

    pub client_id: String,
}

impl Transaction {
    /// Empty record for a client; fields are filled in by the caller
    pub fn new(client_id: &str) -> Self {
        Transaction {
            id: 0,
            date: None,
            merchant: None,
            category: None,
            sale_type: None,
            amount: None,
            client_id: client_id.to_string(),
        }
    }

    /// Category if present and non-empty
    pub fn category_name(&self) -> Option<&str> {
        self.category.as_deref().filter(|c| !c.is_empty())
    }

    /// Merchant if present and non-empty
    pub fn merchant_name(&self) -> Option<&str> {
        self.merchant.as_deref().filter(|m| !m.is_empty())
    }
}

/// Client demographic record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: String,

    #[serde(rename = "fecha_nacimiento")]
    pub birth_date: Option<NaiveDate>,

    #[serde(rename = "fecha_alta")]
    pub signup_date: Option<NaiveDate>,

    #[serde(rename = "id_municipio")]
    pub municipality_id: Option<i64>,

    #[serde(rename = "id_estado")]
    pub state_id: Option<i64>,

    #[serde(rename = "tipo_persona")]
    pub person_type: Option<String>,

    #[serde(rename = "genero")]
    pub gender: Option<String>,

    #[serde(rename = "actividad_empresarial")]
    pub business_activity: Option<String>,
}

impl Client {
    pub fn new(id: &str) -> Self {
        Client {
            id: id.to_string(),
            birth_date: None,
            signup_date: None,
            municipality_id: None,
            state_id: None,
            person_type: None,
            gender: None,
            business_activity: None,
        }
    }
}

// ============================================================================
// CSV ROWS (raw text, normalized on load)
// ============================================================================

#[derive(Debug, Deserialize)]
struct ClientRow {
    id: String,
    #[serde(default)]
    fecha_nacimiento: Option<String>,
    #[serde(default)]
    fecha_alta: Option<String>,
    #[serde(default)]
    id_municipio: Option<String>,
    #[serde(default)]
    id_estado: Option<String>,
    #[serde(default)]
    tipo_persona: Option<String>,
    #[serde(default)]
    genero: Option<String>,
    #[serde(default)]
    actividad_empresarial: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TransactionRow {
    /// Owning client id
    id: String,
    #[serde(default)]
    fecha: Option<String>,
    #[serde(default)]
    comercio: Option<String>,
    #[serde(default)]
    giro_comercio: Option<String>,
    #[serde(default)]
    tipo_venta: Option<String>,
    #[serde(default)]
    monto: Option<String>,
}

/// Transaction read from a CSV file, with its provenance.
/// Provenance feeds the import hash so that loading the same file twice
/// is idempotent.
#[derive(Debug, Clone)]
pub struct ImportRecord {
    pub source_file: String,
    pub line_number: u64,
    pub transaction: Transaction,
}

impl ImportRecord {
    /// SHA-256 over source file + line number
    pub fn import_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("{}:{}", self.source_file, self.line_number));
        format!("{:x}", hasher.finalize())
    }
}

/// Outcome of inserting a batch of transactions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub inserted: usize,
    pub duplicates: usize,
}

/// Trim and drop empty strings
pub fn clean_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a `YYYY-MM-DD` date, `None` on empty or malformed input
pub fn parse_date(value: Option<&str>) -> Option<NaiveDate> {
    let raw = value?.trim();
    if raw.is_empty() {
        return None;
    }
    match NaiveDate::parse_from_str(raw, DATE_FORMAT) {
        Ok(date) => Some(date),
        Err(_) => {
            log::warn!("Ignoring malformed date {:?}", raw);
            None
        }
    }
}

fn parse_number<T: std::str::FromStr>(value: Option<&str>, field: &str) -> Option<T> {
    let raw = value?.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<T>() {
        Ok(n) => Some(n),
        Err(_) => {
            log::warn!("Ignoring malformed {} {:?}", field, raw);
            None
        }
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS clients (
            id TEXT PRIMARY KEY,
            birth_date TEXT,
            signup_date TEXT,
            municipality_id INTEGER,
            state_id INTEGER,
            person_type TEXT,
            gender TEXT,
            business_activity TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            import_hash TEXT UNIQUE,
            client_id TEXT NOT NULL,
            date TEXT,
            merchant TEXT,
            category TEXT,
            sale_type TEXT,
            amount REAL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transactions_client_date
         ON transactions(client_id, date)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// CSV IMPORT
// ============================================================================

pub fn load_clients_csv(csv_path: &Path) -> Result<Vec<Client>> {
    let mut rdr = csv::Reader::from_path(csv_path)
        .with_context(|| format!("Failed to open client CSV: {:?}", csv_path))?;

    let mut clients = Vec::new();

    for result in rdr.deserialize() {
        let row: ClientRow = result.context("Failed to deserialize client row")?;

        let id = row.id.trim().to_string();
        if id.is_empty() {
            log::warn!("Skipping client row without id");
            continue;
        }

        clients.push(Client {
            id,
            birth_date: parse_date(row.fecha_nacimiento.as_deref()),
            signup_date: parse_date(row.fecha_alta.as_deref()),
            municipality_id: parse_number(row.id_municipio.as_deref(), "id_municipio"),
            state_id: parse_number(row.id_estado.as_deref(), "id_estado"),
            person_type: clean_text(row.tipo_persona),
            gender: clean_text(row.genero),
            business_activity: clean_text(row.actividad_empresarial),
        });
    }

    Ok(clients)
}

pub fn load_transactions_csv(csv_path: &Path) -> Result<Vec<ImportRecord>> {
    let mut rdr = csv::Reader::from_path(csv_path)
        .with_context(|| format!("Failed to open transaction CSV: {:?}", csv_path))?;

    let source_file = csv_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| csv_path.display().to_string());

    let mut records = Vec::new();

    for (index, result) in rdr.deserialize().enumerate() {
        let row: TransactionRow = result
            .with_context(|| format!("Failed to deserialize transaction row {}", index + 2))?;

        let transaction = Transaction {
            id: 0,
            date: parse_date(row.fecha.as_deref()),
            merchant: clean_text(row.comercio),
            category: clean_text(row.giro_comercio),
            sale_type: clean_text(row.tipo_venta),
            amount: parse_number(row.monto.as_deref(), "monto"),
            client_id: row.id.trim().to_string(),
        };

        records.push(ImportRecord {
            source_file: source_file.clone(),
            // header is line 1
            line_number: index as u64 + 2,
            transaction,
        });
    }

    Ok(records)
}

/// Insert clients, keeping rows that already exist untouched
pub fn insert_clients(conn: &Connection, clients: &[Client]) -> Result<usize> {
    let mut inserted = 0;

    for client in clients {
        inserted += conn.execute(
            "INSERT OR IGNORE INTO clients (
                id, birth_date, signup_date, municipality_id, state_id,
                person_type, gender, business_activity
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                client.id,
                client.birth_date.map(|d| d.format(DATE_FORMAT).to_string()),
                client.signup_date.map(|d| d.format(DATE_FORMAT).to_string()),
                client.municipality_id,
                client.state_id,
                client.person_type,
                client.gender,
                client.business_activity,
            ],
        )?;
    }

    log::info!(
        "Inserted {} clients ({} already present)",
        inserted,
        clients.len() - inserted
    );

    Ok(inserted)
}

pub fn insert_transactions(conn: &Connection, records: &[ImportRecord]) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();

    for record in records {
        let tx = &record.transaction;

        let result = conn.execute(
            "INSERT INTO transactions (
                import_hash, client_id, date, merchant, category, sale_type, amount
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.import_hash(),
                tx.client_id,
                tx.date.map(|d| d.format(DATE_FORMAT).to_string()),
                tx.merchant,
                tx.category,
                tx.sale_type,
                tx.amount,
            ],
        );

        match result {
            Ok(_) => summary.inserted += 1,
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                summary.duplicates += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    log::info!(
        "Inserted {} transactions, skipped {} duplicates",
        summary.inserted,
        summary.duplicates
    );

    Ok(summary)
}

// ============================================================================
// QUERIES
// ============================================================================

fn date_column(row: &Row, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(idx)?;
    Ok(raw.and_then(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).ok()))
}

pub fn get_client(conn: &Connection, client_id: &str) -> Result<Option<Client>> {
    let client = conn
        .query_row(
            "SELECT id, birth_date, signup_date, municipality_id, state_id,
                    person_type, gender, business_activity
             FROM clients
             WHERE id = ?1",
            [client_id],
            |row| {
                Ok(Client {
                    id: row.get(0)?,
                    birth_date: date_column(row, 1)?,
                    signup_date: date_column(row, 2)?,
                    municipality_id: row.get(3)?,
                    state_id: row.get(4)?,
                    person_type: row.get(5)?,
                    gender: row.get(6)?,
                    business_activity: row.get(7)?,
                })
            },
        )
        .optional()?;

    Ok(client)
}

/// All transactions of one client, newest first (undated rows last)
pub fn get_transactions_for_client(conn: &Connection, client_id: &str) -> Result<Vec<Transaction>> {
    let mut stmt = conn.prepare(
        "SELECT id, client_id, date, merchant, category, sale_type, amount
         FROM transactions
         WHERE client_id = ?1
         ORDER BY date IS NULL, date DESC, id DESC",
    )?;

    let transactions = stmt
        .query_map([client_id], |row| {
            Ok(Transaction {
                id: row.get(0)?,
                client_id: row.get(1)?,
                date: date_column(row, 2)?,
                merchant: row.get(3)?,
                category: row.get(4)?,
                sale_type: row.get(5)?,
                amount: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    log::debug!("Fetched {} transactions for client {}", transactions.len(), client_id);

    Ok(transactions)
}

pub fn count_transactions(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;

    Ok(count)
}

pub fn count_clients(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM clients", [], |row| row.get(0))?;

    Ok(count)
}
