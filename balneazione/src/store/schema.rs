//! Schéma SQLite des snapshots

use rusqlite::Connection;

/// Table des zones
pub const AREAS_TABLE: &str = "areas";

/// Clé primaire de la table des zones
pub const AREAS_KEY: &str = "CODICE";

/// Colonnes de `areas`, dans l'ordre de création
pub const AREA_COLUMNS: [&str; 20] = [
    "CODICE",
    "nome",
    "comune",
    "provincia",
    "siglaProvincia",
    "regione",
    "stato",
    "limiteEi",
    "limiteEc",
    "dataInizioStagioneBalneare",
    "dataFineStagioneBalneare",
    "statoDesc",
    "geometry",
    "isFuoriNorma",
    "ultimaAnalisi",
    "valoreEi",
    "valoreEc",
    "flagOltreLimiti",
    "scheda",
    "interdizioni",
];

const CREATE_AREAS: &str = r#"
CREATE TABLE IF NOT EXISTS areas (
    CODICE INTEGER PRIMARY KEY NOT NULL,
    nome VARCHAR(50) NOT NULL,
    comune VARCHAR(50) NOT NULL,
    provincia VARCHAR(25) NOT NULL,
    siglaProvincia VARCHAR(2) NOT NULL CHECK (length(siglaProvincia) = 2),
    regione INTEGER NOT NULL,
    stato INTEGER NOT NULL,
    limiteEi INTEGER NOT NULL,
    limiteEc INTEGER NOT NULL,
    dataInizioStagioneBalneare VARCHAR(10) NOT NULL,
    dataFineStagioneBalneare VARCHAR(10) NOT NULL,
    statoDesc VARCHAR(50) NOT NULL,
    geometry TEXT NOT NULL,
    isFuoriNorma VARCHAR(1),
    ultimaAnalisi VARCHAR(10),
    valoreEi INTEGER,
    valoreEc INTEGER,
    flagOltreLimiti INTEGER,
    scheda INTEGER,
    interdizioni TEXT
);
"#;

const CREATE_VERSION: &str = r#"
CREATE TABLE IF NOT EXISTS version (
    lastUpdate TIMESTAMP DEFAULT CURRENT_TIMESTAMP NOT NULL
);
"#;

/// Crée les tables si elles n'existent pas
pub fn create_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(CREATE_AREAS)?;
    conn.execute_batch(CREATE_VERSION)?;
    Ok(())
}

/// Requête d'upsert d'une zone (paramètres dans l'ordre de [`AREA_COLUMNS`])
pub fn upsert_area_sql() -> String {
    let placeholders = (1..=AREA_COLUMNS.len())
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT OR REPLACE INTO {} ({}) VALUES ({})",
        AREAS_TABLE,
        AREA_COLUMNS.join(", "),
        placeholders
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_matches_columns() {
        let conn = Connection::open_in_memory().unwrap();
        create_schema(&conn).unwrap();
        // Idempotent
        create_schema(&conn).unwrap();

        let mut stmt = conn.prepare("PRAGMA table_info(areas)").unwrap();
        let names: Vec<String> = stmt
            .query_map([], |row| row.get(1))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        assert_eq!(names, AREA_COLUMNS);
    }

    #[test]
    fn test_upsert_sql() {
        let sql = upsert_area_sql();
        assert!(sql.starts_with("INSERT OR REPLACE INTO areas (CODICE, nome"));
        assert!(sql.ends_with("?19, ?20)"));
    }
}
