//! Admin listings: parameter parsing and validation.
//!
//! Everything a caller sends is checked against the collection's sort table
//! before the store is touched; execution lives in `agora_store::query`.

use agora_shared::constants::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use agora_shared::{Result, UserId, ValidationError};
use agora_store::{
    ListQuery, MessageSort, MessageSummary, Page, RoomSort, RoomSummary, SortField, SortOrder,
    UserSort, UserSummary,
};
use serde::Deserialize;

use crate::service::ChatService;

fn default_limit() -> u32 {
    DEFAULT_PAGE_LIMIT
}

fn default_sort_by() -> String {
    "created_at".to_string()
}

fn default_sort_order() -> String {
    "desc".to_string()
}

/// Raw listing parameters as they arrive on the query string.
#[derive(Debug, Clone, Deserialize)]
pub struct ListParams {
    #[serde(default, alias = "pagination")]
    pub page_offset: u32,
    #[serde(default = "default_limit", alias = "limit")]
    pub page_limit: u32,
    #[serde(default)]
    pub search: String,
    #[serde(default = "default_sort_by")]
    pub sort_by: String,
    #[serde(default = "default_sort_order")]
    pub sort_order: String,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page_offset: 0,
            page_limit: DEFAULT_PAGE_LIMIT,
            search: String::new(),
            sort_by: default_sort_by(),
            sort_order: default_sort_order(),
        }
    }
}

impl ListParams {
    /// Validate against the sort table of `F`.
    pub fn parse<F: SortField>(&self) -> std::result::Result<ListQuery<F>, ValidationError> {
        if !(1..=MAX_PAGE_LIMIT).contains(&self.page_limit) {
            return Err(ValidationError::InvalidPageLimit {
                max: MAX_PAGE_LIMIT,
            });
        }
        let sort = F::parse(&self.sort_by)
            .ok_or_else(|| ValidationError::InvalidSortField(self.sort_by.clone()))?;
        let order = SortOrder::parse(&self.sort_order)
            .ok_or_else(|| ValidationError::InvalidSortOrder(self.sort_order.clone()))?;

        Ok(ListQuery {
            offset: self.page_offset,
            limit: self.page_limit,
            search: self.search.trim().to_lowercase(),
            sort,
            order,
        })
    }
}

impl ChatService {
    pub fn list_users(&self, actor: UserId, params: &ListParams) -> Result<Page<UserSummary>> {
        let query = params.parse::<UserSort>()?;
        self.require_admin(actor)?;
        tracing::debug!(?query, "listing users");
        self.with_db(|db| Ok(db.list_users(&query)?))
    }

    /// Rooms, never including AI rooms or the system AI room.
    pub fn list_rooms(&self, actor: UserId, params: &ListParams) -> Result<Page<RoomSummary>> {
        let query = params.parse::<RoomSort>()?;
        self.require_admin(actor)?;
        tracing::debug!(?query, "listing rooms");
        self.with_db(|db| Ok(db.list_rooms(&query, self.system_ai_room)?))
    }

    pub fn list_messages(
        &self,
        actor: UserId,
        params: &ListParams,
    ) -> Result<Page<MessageSummary>> {
        let query = params.parse::<MessageSort>()?;
        self.require_admin(actor)?;
        tracing::debug!(?query, "listing messages");
        self.with_db(|db| Ok(db.list_messages(&query, self.system_ai_room)?))
    }
}
