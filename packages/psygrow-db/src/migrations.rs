//! Sistema de migrações para banco de dados
//!
//! Este módulo gerencia as migrações do banco de dados SQLite. Cada migração é
//! aplicada em sua própria transação e o progresso fica em `PRAGMA user_version`.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::{error, info};

/// Lista de migrações SQL a serem aplicadas
const MIGRATIONS: &[&str] = &[
    // 001_initial_schema.sql
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id BLOB PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        role TEXT NOT NULL DEFAULT 'professional',
        phone TEXT,
        is_active BOOLEAN NOT NULL DEFAULT 1,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL,
        last_login_at TIMESTAMP
    );

    CREATE TABLE IF NOT EXISTS cost_centers (
        id BLOB PRIMARY KEY NOT NULL,
        user_id BLOB NOT NULL,
        name TEXT NOT NULL,
        repasse_model TEXT NOT NULL CHECK (repasse_model IN ('clinic_pays', 'professional_pays')),
        repasse_type TEXT NOT NULL CHECK (repasse_type IN ('percent', 'fixed')),
        repasse_value INTEGER NOT NULL CHECK (repasse_value >= 0),
        active BOOLEAN NOT NULL DEFAULT 1,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL,
        FOREIGN KEY (user_id) REFERENCES users (id)
    );

    CREATE TABLE IF NOT EXISTS patients (
        id BLOB PRIMARY KEY NOT NULL,
        user_id BLOB NOT NULL,
        cost_center_id BLOB NOT NULL,
        full_name TEXT NOT NULL,
        full_name_search TEXT NOT NULL,
        social_name TEXT,
        birth_date DATE NOT NULL,
        document TEXT,
        phone TEXT,
        email TEXT,
        gender TEXT,
        address TEXT,
        resides_with TEXT,
        emergency_contact_name TEXT,
        emergency_contact_phone TEXT,
        observation TEXT,
        default_repasse_type TEXT CHECK (default_repasse_type IN ('percent', 'fixed')),
        default_repasse_value INTEGER,
        active BOOLEAN NOT NULL DEFAULT 1,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL,
        FOREIGN KEY (user_id) REFERENCES users (id),
        FOREIGN KEY (cost_center_id) REFERENCES cost_centers (id)
    );

    CREATE TABLE IF NOT EXISTS patient_families (
        id BLOB PRIMARY KEY NOT NULL,
        patient_id BLOB NOT NULL,
        relationship TEXT NOT NULL CHECK (relationship IN ('father', 'mother', 'spouse', 'child', 'guardian', 'grandparent', 'sibling', 'other')),
        name TEXT NOT NULL,
        birth_date DATE,
        schooling TEXT,
        occupation TEXT,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL,
        FOREIGN KEY (patient_id) REFERENCES patients (id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS leads (
        id BLOB PRIMARY KEY NOT NULL,
        user_id BLOB NOT NULL,
        full_name TEXT NOT NULL,
        phone TEXT,
        email TEXT,
        birth_date DATE,
        contact_date TIMESTAMP NOT NULL,
        status TEXT NOT NULL DEFAULT 'new' CHECK (status IN ('new', 'in_analysis', 'converted', 'lost')),
        was_attended BOOLEAN NOT NULL DEFAULT 0,
        converted_at TIMESTAMP,
        notes TEXT,
        origin TEXT,
        gdpr_block_contact BOOLEAN NOT NULL DEFAULT 0,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL,
        FOREIGN KEY (user_id) REFERENCES users (id)
    );

    CREATE TABLE IF NOT EXISTS appointments (
        id BLOB PRIMARY KEY NOT NULL,
        user_id BLOB NOT NULL,
        patient_id BLOB NOT NULL,
        professional_id BLOB NOT NULL,
        cost_center_id BLOB NOT NULL,
        service_title TEXT NOT NULL,
        start_time TIMESTAMP NOT NULL,
        end_time TIMESTAMP NOT NULL,
        status TEXT NOT NULL DEFAULT 'scheduled' CHECK (status IN ('scheduled', 'done', 'canceled', 'no_show')),
        notes TEXT,
        custom_repasse_type TEXT CHECK (custom_repasse_type IN ('percent', 'fixed')),
        custom_repasse_value INTEGER,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL,
        FOREIGN KEY (user_id) REFERENCES users (id),
        FOREIGN KEY (patient_id) REFERENCES patients (id),
        FOREIGN KEY (professional_id) REFERENCES users (id),
        FOREIGN KEY (cost_center_id) REFERENCES cost_centers (id)
    );

    CREATE TABLE IF NOT EXISTS sessions (
        id BLOB PRIMARY KEY NOT NULL,
        appointment_id BLOB NOT NULL UNIQUE,
        user_id BLOB NOT NULL,
        patient_id BLOB NOT NULL,
        professional_id BLOB NOT NULL,
        start_time TIMESTAMP NOT NULL,
        end_time TIMESTAMP NOT NULL,
        was_attended BOOLEAN NOT NULL DEFAULT 1,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL,
        FOREIGN KEY (appointment_id) REFERENCES appointments (id) ON DELETE CASCADE,
        FOREIGN KEY (patient_id) REFERENCES patients (id)
    );

    CREATE TABLE IF NOT EXISTS evolutions (
        id BLOB PRIMARY KEY NOT NULL,
        session_id BLOB NOT NULL UNIQUE,
        user_id BLOB NOT NULL,
        professional_id BLOB NOT NULL,
        patient_id BLOB NOT NULL,
        content TEXT NOT NULL CHECK (length(content) > 0),
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL,
        FOREIGN KEY (session_id) REFERENCES sessions (id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS payments (
        id BLOB PRIMARY KEY NOT NULL,
        user_id BLOB NOT NULL,
        patient_id BLOB,
        cost_center_id BLOB NOT NULL,
        payment_date TIMESTAMP NOT NULL,
        amount INTEGER NOT NULL CHECK (amount > 0),
        method TEXT NOT NULL CHECK (method IN ('pix', 'cash', 'card', 'other')),
        notes TEXT,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL,
        FOREIGN KEY (user_id) REFERENCES users (id),
        FOREIGN KEY (patient_id) REFERENCES patients (id),
        FOREIGN KEY (cost_center_id) REFERENCES cost_centers (id)
    );

    CREATE TABLE IF NOT EXISTS payment_appointments (
        id BLOB PRIMARY KEY NOT NULL,
        payment_id BLOB NOT NULL,
        appointment_id BLOB NOT NULL,
        created_at TIMESTAMP NOT NULL,
        UNIQUE (payment_id, appointment_id),
        FOREIGN KEY (payment_id) REFERENCES payments (id) ON DELETE CASCADE,
        FOREIGN KEY (appointment_id) REFERENCES appointments (id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS repasses (
        id BLOB PRIMARY KEY NOT NULL,
        user_id BLOB NOT NULL,
        appointment_id BLOB NOT NULL,
        cost_center_id BLOB NOT NULL,
        value INTEGER NOT NULL CHECK (value >= 0),
        does_clinic_receive BOOLEAN NOT NULL DEFAULT 1,
        status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'paid', 'informational')),
        paid_at TIMESTAMP,
        notes TEXT,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL,
        FOREIGN KEY (user_id) REFERENCES users (id),
        FOREIGN KEY (appointment_id) REFERENCES appointments (id),
        FOREIGN KEY (cost_center_id) REFERENCES cost_centers (id)
    );

    CREATE TABLE IF NOT EXISTS anamnese_templates (
        id BLOB PRIMARY KEY NOT NULL,
        user_id BLOB NOT NULL,
        title TEXT NOT NULL,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL,
        FOREIGN KEY (user_id) REFERENCES users (id)
    );

    CREATE TABLE IF NOT EXISTS anamnese_fields (
        id BLOB PRIMARY KEY NOT NULL,
        anamnese_id BLOB NOT NULL,
        user_id BLOB NOT NULL,
        field_number INTEGER NOT NULL,
        field_type TEXT NOT NULL CHECK (field_type IN ('date', 'datetime', 'text', 'number', 'checkbox', 'select', 'multiselect')),
        field_title TEXT NOT NULL,
        field_required BOOLEAN NOT NULL DEFAULT 0,
        field_active BOOLEAN NOT NULL DEFAULT 1,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL,
        FOREIGN KEY (anamnese_id) REFERENCES anamnese_templates (id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS anamnese_field_options (
        id BLOB PRIMARY KEY NOT NULL,
        anamnese_field_id BLOB NOT NULL,
        option_value TEXT NOT NULL,
        option_order INTEGER NOT NULL DEFAULT 0,
        created_at TIMESTAMP NOT NULL,
        FOREIGN KEY (anamnese_field_id) REFERENCES anamnese_fields (id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS patient_anamneses (
        id BLOB PRIMARY KEY NOT NULL,
        patient_id BLOB NOT NULL,
        anamnese_id BLOB NOT NULL,
        user_id BLOB NOT NULL,
        answered_at TIMESTAMP NOT NULL,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL,
        FOREIGN KEY (patient_id) REFERENCES patients (id) ON DELETE CASCADE,
        FOREIGN KEY (anamnese_id) REFERENCES anamnese_templates (id)
    );

    CREATE TABLE IF NOT EXISTS patient_anamnese_fields (
        id BLOB PRIMARY KEY NOT NULL,
        patient_anamnese_id BLOB NOT NULL,
        field_id BLOB NOT NULL,
        value TEXT NOT NULL,
        created_at TIMESTAMP NOT NULL,
        FOREIGN KEY (patient_anamnese_id) REFERENCES patient_anamneses (id) ON DELETE CASCADE,
        FOREIGN KEY (field_id) REFERENCES anamnese_fields (id)
    );
    "#,
    // 002_indexes.sql
    r#"
    CREATE INDEX IF NOT EXISTS idx_cost_centers_user_id ON cost_centers (user_id);
    CREATE INDEX IF NOT EXISTS idx_patients_user_id ON patients (user_id);
    CREATE INDEX IF NOT EXISTS idx_patients_full_name ON patients (full_name);
    CREATE INDEX IF NOT EXISTS idx_patients_cost_center_id ON patients (cost_center_id);
    CREATE INDEX IF NOT EXISTS idx_patient_families_patient_id ON patient_families (patient_id);
    CREATE INDEX IF NOT EXISTS idx_leads_user_id ON leads (user_id);
    CREATE INDEX IF NOT EXISTS idx_leads_status ON leads (status);
    CREATE INDEX IF NOT EXISTS idx_appointments_user_id ON appointments (user_id);
    CREATE INDEX IF NOT EXISTS idx_appointments_patient_id ON appointments (patient_id);
    CREATE INDEX IF NOT EXISTS idx_appointments_start_time ON appointments (start_time);
    CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions (user_id);
    CREATE INDEX IF NOT EXISTS idx_evolutions_patient_id ON evolutions (patient_id);
    CREATE INDEX IF NOT EXISTS idx_payments_user_id ON payments (user_id);
    CREATE INDEX IF NOT EXISTS idx_payment_appointments_payment_id ON payment_appointments (payment_id);
    CREATE INDEX IF NOT EXISTS idx_repasses_user_id ON repasses (user_id);
    CREATE INDEX IF NOT EXISTS idx_repasses_status ON repasses (status);
    CREATE INDEX IF NOT EXISTS idx_anamnese_fields_anamnese_id ON anamnese_fields (anamnese_id);
    CREATE INDEX IF NOT EXISTS idx_anamnese_field_options_field_id ON anamnese_field_options (anamnese_field_id);
    CREATE INDEX IF NOT EXISTS idx_patient_anamneses_patient_id ON patient_anamneses (patient_id);
    "#,
];

/// Executa todas as migrações pendentes no banco de dados
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Aplicando migrações de banco de dados...");

    // Obter a versão atual do banco de dados
    let version: i64 = match sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await
    {
        Ok(v) => v,
        Err(e) => {
            // Pode ser a primeira execução
            error!("Erro ao obter versão do banco: {}", e);
            0
        }
    };

    info!("Versão atual do banco: {}", version);

    for (i, migration_sql) in MIGRATIONS.iter().enumerate() {
        let migration_version = (i + 1) as i64;

        if migration_version <= version {
            continue;
        }

        info!("Aplicando migração {}...", migration_version);

        let mut transaction = pool
            .begin()
            .await
            .with_context(|| format!("Falha ao iniciar transação para migração {}", migration_version))?;

        sqlx::query(migration_sql)
            .execute(&mut *transaction)
            .await
            .with_context(|| format!("Falha ao executar migração {}", migration_version))?;

        sqlx::query(&format!("PRAGMA user_version = {}", migration_version))
            .execute(&mut *transaction)
            .await
            .with_context(|| format!("Falha ao atualizar versão para {}", migration_version))?;

        transaction
            .commit()
            .await
            .with_context(|| format!("Falha ao confirmar transação para migração {}", migration_version))?;

        info!("Migração {} aplicada com sucesso", migration_version);
    }

    info!("Migrações concluídas. Versão atual: {}", MIGRATIONS.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqliteConnectOptions;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_migrations() -> Result<()> {
        let temp_dir = tempdir()?;
        let db_path = temp_dir.path().join("test_migrations.db");

        let conn_options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(conn_options).await?;

        run_migrations(&pool).await?;

        let version: i64 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(&pool)
            .await?;
        assert_eq!(version, MIGRATIONS.len() as i64);

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        )
        .fetch_all(&pool)
        .await?;

        for expected in [
            "users",
            "cost_centers",
            "patients",
            "patient_families",
            "leads",
            "appointments",
            "sessions",
            "evolutions",
            "payments",
            "payment_appointments",
            "repasses",
            "anamnese_templates",
            "anamnese_fields",
            "anamnese_field_options",
            "patient_anamneses",
            "patient_anamnese_fields",
        ] {
            assert!(tables.contains(&expected.to_string()), "tabela ausente: {}", expected);
        }

        Ok(())
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() -> Result<()> {
        let temp_dir = tempdir()?;
        let conn_options = SqliteConnectOptions::new()
            .filename(temp_dir.path().join("twice.db"))
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(conn_options).await?;

        run_migrations(&pool).await?;
        run_migrations(&pool).await?;

        let version: i64 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(&pool)
            .await?;
        assert_eq!(version, MIGRATIONS.len() as i64);
        Ok(())
    }
}
