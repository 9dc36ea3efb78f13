use crate::auth::auth::AuthUser;
use crate::error::ApiError;
use crate::geo::distance::Coordinate;
use crate::model::work_location::{LocationType, WorkLocation};
use crate::utils::location_cache::{LocationCache, SELECT_LOCATIONS};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct CreateWorkLocation {
    #[schema(example = "Main Clinic")]
    pub name: String,
    #[schema(example = json!(-6.2))]
    pub latitude: f64,
    #[schema(example = 106.816)]
    pub longitude: f64,
    #[schema(example = 100.0)]
    pub radius_meters: f64,
    #[schema(example = "clinic")]
    pub location_type: Option<LocationType>,
    pub address: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateWorkLocation {
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub radius_meters: Option<f64>,
    pub location_type: Option<LocationType>,
    pub address: Option<String>,
}

#[derive(Deserialize, IntoParams)]
pub struct WorkLocationFilter {
    /// Only active (true) or only disabled (false) sites
    pub active: Option<bool>,
}

/// Checked field set for an insert or an update.
#[derive(Debug)]
struct LocationFields {
    name: String,
    center: Coordinate,
    radius_meters: f64,
    location_type: LocationType,
    address: Option<String>,
}

fn validate_fields(
    name: &str,
    latitude: f64,
    longitude: f64,
    radius_meters: f64,
    location_type: LocationType,
    address: Option<String>,
) -> Result<LocationFields, ApiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("name must not be empty".into()));
    }

    let center =
        Coordinate::new(latitude, longitude).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    if !radius_meters.is_finite() || radius_meters <= 0.0 {
        return Err(ApiError::BadRequest(
            "radius_meters must be greater than zero".into(),
        ));
    }

    Ok(LocationFields {
        name: name.to_string(),
        center,
        radius_meters,
        location_type,
        address: address
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty()),
    })
}

async fn fetch_location(pool: &MySqlPool, id: u64) -> Result<WorkLocation, ApiError> {
    let sql = format!("{SELECT_LOCATIONS} WHERE id = ?");
    sqlx::query_as::<_, WorkLocation>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            error!(error = %e, location_id = id, "Failed to fetch work location");
            ApiError::Internal
        })?
        .ok_or_else(|| ApiError::NotFound("Work location not found".into()))
}

/// List work locations
#[utoipa::path(
    get,
    path = "/api/v1/work-locations",
    params(WorkLocationFilter),
    responses(
        (status = 200, description = "Work locations", body = [WorkLocation]),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "WorkLocation"
)]
pub async fn list_locations(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<WorkLocationFilter>,
) -> Result<HttpResponse, ApiError> {
    let mut sql = String::from(SELECT_LOCATIONS);
    if query.active.is_some() {
        sql.push_str(" WHERE is_active = ?");
    }
    sql.push_str(" ORDER BY name");

    let mut q = sqlx::query_as::<_, WorkLocation>(&sql);
    if let Some(active) = query.active {
        q = q.bind(active);
    }

    let locations = q.fetch_all(pool.get_ref()).await.map_err(|e| {
        error!(error = %e, "Failed to list work locations");
        ApiError::Internal
    })?;

    Ok(HttpResponse::Ok().json(locations))
}

/// Get one work location
#[utoipa::path(
    get,
    path = "/api/v1/work-locations/{id}",
    params(
        ("id" = u64, Path, description = "Work location id")
    ),
    responses(
        (status = 200, description = "Work location", body = WorkLocation),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "WorkLocation"
)]
pub async fn get_location(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    auth.require_location_manager()?;

    let location = fetch_location(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(location))
}

/// Create a work location
#[utoipa::path(
    post,
    path = "/api/v1/work-locations",
    request_body = CreateWorkLocation,
    responses(
        (status = 201, description = "Created", body = WorkLocation),
        (status = 400, description = "Invalid coordinates, radius or name"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "WorkLocation"
)]
pub async fn create_location(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<LocationCache>,
    payload: web::Json<CreateWorkLocation>,
) -> Result<HttpResponse, ApiError> {
    auth.require_location_manager()?;

    let payload = payload.into_inner();
    let fields = validate_fields(
        &payload.name,
        payload.latitude,
        payload.longitude,
        payload.radius_meters,
        payload.location_type.unwrap_or(LocationType::Clinic),
        payload.address,
    )?;

    let result = sqlx::query(
        r#"
        INSERT INTO work_locations
            (name, latitude, longitude, radius_meters, location_type, address)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&fields.name)
    .bind(fields.center.latitude)
    .bind(fields.center.longitude)
    .bind(fields.radius_meters)
    .bind(fields.location_type.as_ref())
    .bind(&fields.address)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to create work location");
        ApiError::Internal
    })?;

    cache.invalidate().await;

    let id = result.last_insert_id();
    info!(location_id = id, created_by = auth.user_id, "Work location created");

    let location = fetch_location(pool.get_ref(), id).await?;
    Ok(HttpResponse::Created().json(location))
}

/// Update a work location (partial)
#[utoipa::path(
    put,
    path = "/api/v1/work-locations/{id}",
    params(
        ("id" = u64, Path, description = "Work location id")
    ),
    request_body = UpdateWorkLocation,
    responses(
        (status = 200, description = "Updated", body = WorkLocation),
        (status = 400, description = "Invalid coordinates, radius or name"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "WorkLocation"
)]
pub async fn update_location(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<LocationCache>,
    path: web::Path<u64>,
    payload: web::Json<UpdateWorkLocation>,
) -> Result<HttpResponse, ApiError> {
    auth.require_location_manager()?;

    let id = path.into_inner();
    let current = fetch_location(pool.get_ref(), id).await?;
    let patch = payload.into_inner();

    let fields = validate_fields(
        patch.name.as_deref().unwrap_or(&current.name),
        patch.latitude.unwrap_or(current.latitude),
        patch.longitude.unwrap_or(current.longitude),
        patch.radius_meters.unwrap_or(current.radius_meters),
        patch.location_type.unwrap_or(current.location_type),
        patch.address.or(current.address),
    )?;

    sqlx::query(
        r#"
        UPDATE work_locations
        SET name = ?, latitude = ?, longitude = ?, radius_meters = ?,
            location_type = ?, address = ?
        WHERE id = ?
        "#,
    )
    .bind(&fields.name)
    .bind(fields.center.latitude)
    .bind(fields.center.longitude)
    .bind(fields.radius_meters)
    .bind(fields.location_type.as_ref())
    .bind(&fields.address)
    .bind(id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, location_id = id, "Failed to update work location");
        ApiError::Internal
    })?;

    cache.invalidate().await;
    info!(location_id = id, updated_by = auth.user_id, "Work location updated");

    let location = fetch_location(pool.get_ref(), id).await?;
    Ok(HttpResponse::Ok().json(location))
}

async fn set_active(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<LocationCache>,
    id: u64,
    active: bool,
) -> Result<HttpResponse, ApiError> {
    auth.require_location_manager()?;

    // Existence check first so an unchanged flag is not reported as 404.
    fetch_location(pool.get_ref(), id).await?;

    sqlx::query("UPDATE work_locations SET is_active = ? WHERE id = ?")
        .bind(active)
        .bind(id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, location_id = id, "Failed to toggle work location");
            ApiError::Internal
        })?;

    cache.invalidate().await;
    info!(location_id = id, active, changed_by = auth.user_id, "Work location toggled");

    let location = fetch_location(pool.get_ref(), id).await?;
    Ok(HttpResponse::Ok().json(location))
}

/// Disable a work location. Locations are never deleted.
#[utoipa::path(
    put,
    path = "/api/v1/work-locations/{id}/deactivate",
    params(
        ("id" = u64, Path, description = "Work location id")
    ),
    responses(
        (status = 200, description = "Disabled", body = WorkLocation),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "WorkLocation"
)]
pub async fn deactivate_location(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<LocationCache>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    set_active(auth, pool, cache, path.into_inner(), false).await
}

/// Re-enable a disabled work location
#[utoipa::path(
    put,
    path = "/api/v1/work-locations/{id}/activate",
    params(
        ("id" = u64, Path, description = "Work location id")
    ),
    responses(
        (status = 200, description = "Enabled", body = WorkLocation),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "WorkLocation"
)]
pub async fn activate_location(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<LocationCache>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    set_active(auth, pool, cache, path.into_inner(), true).await
}
