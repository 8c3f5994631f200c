use sea_orm::{ConnectionTrait, Database, DatabaseConnection};
use std::env;

pub async fn connect() -> Result<DatabaseConnection, sea_orm::DbErr> {
    let db_url = env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://subscope:@localhost:5432/subscope".to_string());

    let db = Database::connect(db_url).await?;
    tracing::info!("Connected to the database");

    create_schema(&db).await?;

    Ok(db)
}

pub async fn create_schema(db: &DatabaseConnection) -> Result<(), sea_orm::DbErr> {
    use crate::entities::{account, alert, domain, endpoint, scan, subdomain};
    use sea_orm::sea_query::Index;
    use sea_orm::schema::Schema;

    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let stmt = schema
        .create_table_from_entity(account::Entity)
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&stmt)).await?;

    let stmt = schema
        .create_table_from_entity(domain::Entity)
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&stmt)).await?;

    let stmt = schema
        .create_table_from_entity(scan::Entity)
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&stmt)).await?;

    let stmt = schema
        .create_table_from_entity(subdomain::Entity)
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&stmt)).await?;

    let stmt = schema
        .create_table_from_entity(endpoint::Entity)
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&stmt)).await?;

    let stmt = schema
        .create_table_from_entity(alert::Entity)
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&stmt)).await?;

    // Duplicate subdomain inserts for one scan are absorbed via ON CONFLICT,
    // which needs this composite unique index.
    let idx = Index::create()
        .name("idx_subdomains_scan_id_subdomain")
        .table(subdomain::Entity)
        .col(subdomain::Column::ScanId)
        .col(subdomain::Column::Subdomain)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&idx)).await?;

    tracing::info!("Schema initialized");
    Ok(())
}
