use std::env;

use anyhow::Result;
use bronze_core::db::{self, DbPool};
use bronze_core::{Database, LoadPolicy, PostgresDatabase};
use bronze_parser::formats::schema::{CENSUS_G02_SCHEMA, LISTINGS_SCHEMA};
use bronze_parser::{parse_file, CanonicalRow, TableBatch, Value, CENSUS_G02, LISTINGS};
use chrono::NaiveDate;
use uuid::Uuid;

type ListingRow = (
    Option<i64>,
    Option<NaiveDate>,
    Option<NaiveDate>,
    Option<f64>,
    Option<i64>,
    Option<String>,
);

async fn test_pool(test_name: &str) -> Result<Option<DbPool>> {
    let database_url = match env::var("BRONZE_TEST_DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("Skipping {test_name} because BRONZE_TEST_DATABASE_URL is not set");
            return Ok(None);
        }
    };

    let pool = db::connect(&database_url, 2).await?;
    db::run_migrations(&pool).await?;
    Ok(Some(pool))
}

async fn count_source(pool: &DbPool, table: &str, source_file: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM {table} WHERE source_file = $1"
    ))
    .bind(source_file)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

fn listings(ids: &[i64]) -> String {
    let mut csv = String::from(
        "LISTING_ID,SCRAPED_DATE,HOST_SINCE,PRICE,AVAILABILITY_30,NEIGHBOURHOOD_CLEANSED\n",
    );
    for id in ids {
        csv.push_str(&format!("{id},10/05/2020,not a date,65.5,NaN,Sydney\n"));
    }
    csv
}

#[tokio::test]
async fn replace_source_is_idempotent() -> Result<()> {
    let Some(pool) = test_pool("replace_source_is_idempotent").await? else {
        return Ok(());
    };
    let database = PostgresDatabase::new(pool.clone());
    let source = format!("airbnb/{}/07_2020.csv", Uuid::new_v4());

    let batch = parse_file(&LISTINGS, listings(&[1, 2, 3]).as_bytes(), &source)?;
    assert_eq!(database.load(&batch, LoadPolicy::ReplaceSource).await?, 3);
    assert_eq!(database.load(&batch, LoadPolicy::ReplaceSource).await?, 3);
    assert_eq!(count_source(&pool, LISTINGS_SCHEMA.table, &source).await?, 3);

    let row: ListingRow = sqlx::query_as(
        "SELECT listing_id, scraped_date, host_since, price, availability_30, listing_neighbourhood \
         FROM bronze.airbnb_listings_raw WHERE source_file = $1 ORDER BY listing_id LIMIT 1",
    )
    .bind(&source)
    .fetch_one(&pool)
    .await?;
    assert_eq!(row.0, Some(1));
    assert_eq!(row.1, NaiveDate::from_ymd_opt(2020, 5, 10));
    assert_eq!(row.2, None);
    assert_eq!(row.3, Some(65.5));
    assert_eq!(row.4, None);
    assert_eq!(row.5.as_deref(), Some("Sydney"));

    assert_eq!(database.delete_source(LISTINGS_SCHEMA.table, &source).await?, 3);
    Ok(())
}

#[tokio::test]
async fn append_accumulates() -> Result<()> {
    let Some(pool) = test_pool("append_accumulates").await? else {
        return Ok(());
    };
    let database = PostgresDatabase::new(pool.clone());
    let source = format!("airbnb/{}/listings.csv", Uuid::new_v4());

    let batch = parse_file(&LISTINGS, listings(&[10, 11]).as_bytes(), &source)?;
    database.load(&batch, LoadPolicy::Append).await?;
    database.load(&batch, LoadPolicy::Append).await?;
    assert_eq!(count_source(&pool, LISTINGS_SCHEMA.table, &source).await?, 4);

    database.delete_source(LISTINGS_SCHEMA.table, &source).await?;
    Ok(())
}

#[tokio::test]
async fn census_payload_is_stored_as_jsonb() -> Result<()> {
    let Some(pool) = test_pool("census_payload_is_stored_as_jsonb").await? else {
        return Ok(());
    };
    let database = PostgresDatabase::new(pool.clone());
    let source = format!("census/{}/2016Census_G02_NSW_LGA.csv", Uuid::new_v4());

    let csv = "LGA_CODE_2016,Median_age_persons,Average_household_size\nLGA10050,39,2.4\n";
    let batch = parse_file(&CENSUS_G02, csv.as_bytes(), &source)?;
    database.load(&batch, LoadPolicy::Append).await?;

    let (code, age): (String, i64) = sqlx::query_as(
        "SELECT lga_code, (payload->>'Median_age_persons')::bigint \
         FROM bronze.census_g02_raw WHERE source_file = $1",
    )
    .bind(&source)
    .fetch_one(&pool)
    .await?;
    assert_eq!(code, "LGA10050");
    assert_eq!(age, 39);

    database.delete_source("bronze.census_g02_raw", &source).await?;
    Ok(())
}

#[tokio::test]
async fn failed_insert_rolls_back_the_replace_delete() -> Result<()> {
    let Some(pool) = test_pool("failed_insert_rolls_back_the_replace_delete").await? else {
        return Ok(());
    };
    let database = PostgresDatabase::new(pool.clone());
    let source = format!("census/{}/2016Census_G02_NSW_LGA.csv", Uuid::new_v4());

    let csv = "LGA_CODE_2016,Median_age_persons\nLGA10050,39\nLGA10130,42\n";
    let good = parse_file(&CENSUS_G02, csv.as_bytes(), &source)?;
    database.load(&good, LoadPolicy::ReplaceSource).await?;
    assert_eq!(count_source(&pool, CENSUS_G02_SCHEMA.table, &source).await?, 2);

    // The payload cast to jsonb fails only after the delete has run.
    let broken = TableBatch::new(
        CENSUS_G02_SCHEMA,
        source.clone(),
        vec![CanonicalRow::new(vec![
            Value::Text("LGA10050".into()),
            Value::Text("{not json".into()),
            Value::Text(source.clone()),
        ])],
    )?;
    let result = database.load(&broken, LoadPolicy::ReplaceSource).await;

    assert!(result.is_err());
    assert_eq!(count_source(&pool, CENSUS_G02_SCHEMA.table, &source).await?, 2);

    database.delete_source(CENSUS_G02_SCHEMA.table, &source).await?;
    Ok(())
}
