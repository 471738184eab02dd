//! Différence ligne à ligne entre deux snapshots
//!
//! La comparaison suit le schéma : la clé primaire est lue dans
//! `PRAGMA table_info`, les colonnes sont comparées une à une et le résultat
//! est exprimé en instructions SQL rejouables (INSERT / UPDATE / DELETE).

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags};
use tracing::debug;

use super::DiffError;
use crate::store::schema::AREAS_TABLE;

/// Contenu d'une table, indexé par clé primaire entière
#[derive(Debug, Clone, Default)]
pub struct TableSnapshot {
    pub columns: Vec<String>,
    /// Index de la colonne clé dans `columns`
    pub key_index: usize,
    pub rows: BTreeMap<i64, Vec<Value>>,
}

impl TableSnapshot {
    pub fn key(&self) -> &str {
        &self.columns[self.key_index]
    }
}

/// Lit une table entière
pub fn load_table(conn: &Connection, table: &str) -> Result<TableSnapshot, DiffError> {
    let mut columns = Vec::new();
    let mut key_index = None;
    {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let name: String = row.get(1)?;
            let pk: i64 = row.get(5)?;
            if pk == 1 {
                key_index = Some(columns.len());
            }
            columns.push(name);
        }
    }
    if columns.is_empty() {
        return Err(DiffError::MissingTable(table.to_string()));
    }
    let key_index = key_index.ok_or_else(|| DiffError::MissingKey(table.to_string()))?;

    let select = format!(
        "SELECT {} FROM {}",
        columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", "),
        quote_ident(table)
    );
    let mut stmt = conn.prepare(&select)?;
    let mut rows = stmt.query([])?;
    let mut by_key = BTreeMap::new();
    while let Some(row) = rows.next()? {
        let values = (0..columns.len())
            .map(|i| row.get::<_, Value>(i))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        let key = match values[key_index] {
            Value::Integer(k) => k,
            _ => return Err(DiffError::MissingKey(table.to_string())),
        };
        by_key.insert(key, values);
    }

    Ok(TableSnapshot {
        columns,
        key_index,
        rows: by_key,
    })
}

/// Instructions transformant `old` en `new`, par clé croissante
pub fn diff_tables(
    table: &str,
    old: &TableSnapshot,
    new: &TableSnapshot,
) -> Result<Vec<String>, DiffError> {
    if old.columns != new.columns || old.key_index != new.key_index {
        return Err(DiffError::SchemaMismatch(table.to_string()));
    }

    let keys: BTreeSet<i64> = old.rows.keys().chain(new.rows.keys()).copied().collect();
    let mut statements = Vec::new();

    for key in keys {
        match (old.rows.get(&key), new.rows.get(&key)) {
            (Some(before), Some(after)) => {
                let changes: Vec<String> = new
                    .columns
                    .iter()
                    .zip(before.iter().zip(after.iter()))
                    .filter(|(_, (b, a))| b != a)
                    .map(|(column, (_, a))| format!("{}={}", quote_ident(column), sql_literal(a)))
                    .collect();
                if !changes.is_empty() {
                    statements.push(format!(
                        "UPDATE {} SET {} WHERE {}={};",
                        table,
                        changes.join(", "),
                        quote_ident(new.key()),
                        key
                    ));
                }
            }
            (Some(_), None) => {
                statements.push(format!(
                    "DELETE FROM {} WHERE {}={};",
                    table,
                    quote_ident(old.key()),
                    key
                ));
            }
            (None, Some(after)) => {
                statements.push(format!(
                    "INSERT INTO {}({}) VALUES({});",
                    table,
                    new.columns
                        .iter()
                        .map(|c| quote_ident(c))
                        .collect::<Vec<_>>()
                        .join(","),
                    after.iter().map(sql_literal).collect::<Vec<_>>().join(",")
                ));
            }
            (None, None) => {}
        }
    }

    Ok(statements)
}

/// Différence de la table `areas` entre deux bases (ancienne → nouvelle)
///
/// La table `version` est ignorée : elle change à chaque exécution.
pub fn diff_databases(older: &Path, newer: &Path) -> Result<Vec<String>, DiffError> {
    let old = load_table(&open_read_only(older)?, AREAS_TABLE)?;
    let new = load_table(&open_read_only(newer)?, AREAS_TABLE)?;
    let statements = diff_tables(AREAS_TABLE, &old, &new)?;

    debug!(
        older = %older.display(),
        newer = %newer.display(),
        old_rows = old.rows.len(),
        new_rows = new.rows.len(),
        statements = statements.len(),
        "Snapshots compared"
    );

    Ok(statements)
}

fn open_read_only(path: &Path) -> Result<Connection, DiffError> {
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|source| DiffError::Open {
        path: path.to_path_buf(),
        source,
    })
}

/// Identifiant SQL, entre guillemets seulement si nécessaire
fn quote_ident(name: &str) -> String {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

/// Littéral SQL d'une valeur
fn sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => format!("{:?}", f),
        Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
        Value::Blob(b) => format!("X'{}'", hex::encode(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[(i64, &str, Option<i64>)]) -> TableSnapshot {
        TableSnapshot {
            columns: vec!["CODICE".into(), "nome".into(), "valoreEi".into()],
            key_index: 0,
            rows: rows
                .iter()
                .map(|(k, nome, ei)| {
                    (
                        *k,
                        vec![
                            Value::Integer(*k),
                            Value::Text(nome.to_string()),
                            ei.map_or(Value::Null, Value::Integer),
                        ],
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn test_identical_tables() {
        let t = table(&[(1, "a", Some(1)), (2, "b", None)]);
        assert!(diff_tables("areas", &t, &t.clone()).unwrap().is_empty());
    }

    #[test]
    fn test_insert_update_delete() {
        let old = table(&[(1, "a", Some(1)), (2, "b", None), (3, "c", None)]);
        let new = table(&[(1, "a", Some(5)), (3, "l'isola", None), (4, "d", None)]);

        let diff = diff_tables("areas", &old, &new).unwrap();

        assert_eq!(
            diff,
            vec![
                "UPDATE areas SET valoreEi=5 WHERE CODICE=1;",
                "DELETE FROM areas WHERE CODICE=2;",
                "UPDATE areas SET nome='l''isola' WHERE CODICE=3;",
                "INSERT INTO areas(CODICE,nome,valoreEi) VALUES(4,'d',NULL);",
            ]
        );
    }

    #[test]
    fn test_schema_mismatch() {
        let old = table(&[]);
        let mut new = table(&[]);
        new.columns.push("extra".into());
        assert!(matches!(
            diff_tables("areas", &old, &new),
            Err(DiffError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_literals() {
        assert_eq!(sql_literal(&Value::Real(1.0)), "1.0");
        assert_eq!(sql_literal(&Value::Blob(vec![0xde, 0xad])), "X'dead'");
        assert_eq!(quote_ident("CODICE"), "CODICE");
        assert_eq!(quote_ident("a b"), "\"a b\"");
    }
}
