// Hand-maintained Diesel schema for the pipeline's tables. Keep in sync
// with `migrations/`.

diesel::table! {
    use diesel::sql_types::*;
    use crate::models::sql_types::JobStatus;

    ingestion_jobs (id) {
        id -> Uuid,
        created_at -> Timestamp,
        updated_at -> Timestamp,
        source -> Text,
        scope -> Nullable<Text>,
        status -> JobStatus,
        started_at -> Timestamp,
        finished_at -> Nullable<Timestamp>,
        total_count -> Int4,
        recorded_count -> Int4,
        error_count -> Int4,
    }
}

diesel::table! {
    use diesel::sql_types::*;
    use crate::models::sql_types::RawDealStatus;

    ingested_deal_raw (id) {
        id -> Uuid,
        created_at -> Timestamp,
        updated_at -> Timestamp,
        job_id -> Uuid,
        merchant_alias -> Nullable<Text>,
        raw_payload -> Jsonb,
        normalized_payload -> Nullable<Jsonb>,
        status -> RawDealStatus,
        matched_merchant_id -> Nullable<Uuid>,
        confidence -> Nullable<Float8>,
    }
}

diesel::table! {
    use diesel::sql_types::*;
    use crate::models::sql_types::IngestionStage;

    ingestion_errors (id) {
        id -> Uuid,
        created_at -> Timestamp,
        job_id -> Uuid,
        stage -> IngestionStage,
        error_message -> Text,
        payload -> Nullable<Jsonb>,
    }
}

diesel::table! {
    merchants (id) {
        id -> Uuid,
        created_at -> Timestamp,
        updated_at -> Timestamp,
        business_name -> Text,
        email -> Nullable<Text>,
        phone -> Nullable<Text>,
        website -> Nullable<Text>,
        address_line -> Nullable<Text>,
        city -> Nullable<Text>,
        state -> Nullable<Text>,
        postal_code -> Nullable<Text>,
        country -> Nullable<Text>,
        status -> Text,
        level -> Int4,
    }
}

diesel::table! {
    merchant_aliases (id) {
        id -> Uuid,
        created_at -> Timestamp,
        merchant_id -> Uuid,
        alias -> Text,
        source -> Text,
        confidence -> Nullable<Float8>,
    }
}

diesel::table! {
    merchant_locations (id) {
        id -> Uuid,
        created_at -> Timestamp,
        merchant_id -> Uuid,
        address_line -> Nullable<Text>,
        city -> Nullable<Text>,
        state -> Nullable<Text>,
        postal_code -> Nullable<Text>,
        latitude -> Nullable<Float8>,
        longitude -> Nullable<Float8>,
        is_primary -> Bool,
    }
}

diesel::table! {
    use diesel::sql_types::*;
    use crate::models::sql_types::DealStatus;

    deals (id) {
        id -> Uuid,
        created_at -> Timestamp,
        updated_at -> Timestamp,
        merchant_id -> Uuid,
        location_id -> Nullable<Uuid>,
        title -> Text,
        description -> Nullable<Text>,
        original_price -> Nullable<Float8>,
        deal_price -> Nullable<Float8>,
        discount_percentage -> Nullable<Float8>,
        category -> Nullable<Text>,
        starts_at -> Timestamp,
        ends_at -> Timestamp,
        status -> DealStatus,
        visibility -> Text,
        image_url -> Nullable<Text>,
        terms -> Nullable<Text>,
        source_type -> Text,
        source_reference -> Nullable<Text>,
        source_details -> Jsonb,
        confidence_score -> Nullable<Float8>,
        max_redemptions -> Nullable<Int4>,
        redemptions_per_user -> Nullable<Int4>,
    }
}

diesel::table! {
    deal_sources (id) {
        id -> Uuid,
        created_at -> Timestamp,
        deal_id -> Uuid,
        source_type -> Text,
        source_url -> Nullable<Text>,
        fetched_at -> Nullable<Timestamp>,
        confidence -> Nullable<Float8>,
        metadata -> Nullable<Jsonb>,
    }
}

diesel::table! {
    use diesel::sql_types::*;
    use crate::models::sql_types::QueueJobStatus;

    queue_jobs (id) {
        id -> Uuid,
        created_at -> Timestamp,
        updated_at -> Timestamp,
        queue -> Text,
        job_name -> Text,
        payload -> Jsonb,
        status -> QueueJobStatus,
        attempts -> Int4,
        max_attempts -> Int4,
        run_at -> Timestamp,
        locked_by -> Nullable<Text>,
        error_message -> Nullable<Text>,
    }
}

diesel::joinable!(ingested_deal_raw -> ingestion_jobs (job_id));
diesel::joinable!(ingestion_errors -> ingestion_jobs (job_id));
diesel::joinable!(merchant_aliases -> merchants (merchant_id));
diesel::joinable!(merchant_locations -> merchants (merchant_id));
diesel::joinable!(deals -> merchants (merchant_id));
diesel::joinable!(deal_sources -> deals (deal_id));

diesel::allow_tables_to_appear_in_same_query!(
    ingestion_jobs,
    ingested_deal_raw,
    ingestion_errors,
    merchants,
    merchant_aliases,
    merchant_locations,
    deals,
    deal_sources,
    queue_jobs,
);
