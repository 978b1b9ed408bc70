use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::queries::{self, ServiceFilter};
use crate::errors::AppError;
use crate::models::{PageQuery, Pagination, RatingSummary, Review, Service, ServiceCategory};
use crate::state::AppState;

use super::current_user;

// GET /api/services
#[derive(Deserialize)]
pub struct ServicesQuery {
    pub category: Option<String>,
    pub featured: Option<bool>,
    pub popular: Option<bool>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct ServiceList {
    pub services: Vec<Service>,
    pub pagination: Pagination,
}

pub async fn list_services(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ServicesQuery>,
) -> Result<Json<ServiceList>, AppError> {
    let category = match query.category.as_deref() {
        Some(raw) => Some(
            ServiceCategory::parse(raw)
                .ok_or_else(|| AppError::Validation(format!("unknown category: {raw}")))?,
        ),
        None => None,
    };
    let filter = ServiceFilter {
        category,
        featured: query.featured,
        popular: query.popular,
        search: query.search,
        include_inactive: false,
    };
    let (page, limit, offset) = PageQuery {
        page: query.page,
        limit: query.limit,
    }
    .resolve(12);

    let conn = state.conn()?;
    let services = queries::list_services(&conn, &filter, limit, offset)?;
    let total = queries::count_services(&conn, &filter)?;

    Ok(Json(ServiceList {
        services,
        pagination: Pagination::new(page, limit, total),
    }))
}

// GET /api/services/categories
#[derive(Serialize)]
pub struct CategoryCount {
    pub id: ServiceCategory,
    pub name: &'static str,
    pub count: i64,
}

pub async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CategoryCount>>, AppError> {
    let counts = {
        let conn = state.conn()?;
        queries::category_counts(&conn)?
    };

    Ok(Json(
        counts
            .into_iter()
            .map(|(category, count)| CategoryCount {
                id: category,
                name: category.display_name(),
                count,
            })
            .collect(),
    ))
}

// GET /api/services/:id
pub async fn get_service(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Service>, AppError> {
    let service = {
        let conn = state.conn()?;
        queries::get_service(&conn, &id)?
    };

    service
        .filter(|s| s.is_active)
        .map(Json)
        .ok_or_else(|| AppError::NotFound("service not found".to_string()))
}

// POST /api/services/:id/reviews
#[derive(Deserialize)]
pub struct ReviewRequest {
    pub rating: u8,
    pub comment: Option<String>,
}

pub async fn add_review(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<ReviewRequest>,
) -> Result<(StatusCode, Json<RatingSummary>), AppError> {
    let user = current_user(&state, &headers)?;
    if !(1..=5).contains(&payload.rating) {
        return Err(AppError::Validation("rating must be between 1 and 5".to_string()));
    }
    let comment = payload.comment.map(|c| c.trim().to_string()).filter(|c| !c.is_empty());
    if comment.as_ref().is_some_and(|c| c.chars().count() > 500) {
        return Err(AppError::Validation("review comment cannot exceed 500 characters".to_string()));
    }

    let summary = {
        let conn = state.conn()?;
        if queries::get_service(&conn, &id)?.is_none() {
            return Err(AppError::NotFound("service not found".to_string()));
        }
        if !queries::has_completed_booking(&conn, &user.id, &id)? {
            return Err(AppError::Forbidden(
                "only clients who completed this service can review it".to_string(),
            ));
        }
        queries::upsert_review(
            &conn,
            &Review {
                service_id: id.clone(),
                user_id: user.id.clone(),
                rating: payload.rating,
                comment,
                created_at: state.now(),
            },
        )?
    };

    tracing::info!(service_id = %id, user_id = %user.id, rating = payload.rating, "review saved");
    Ok((StatusCode::CREATED, Json(summary)))
}
