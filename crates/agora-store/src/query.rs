//! Search / sort / paginate execution for the admin listings.
//!
//! Sort columns only ever come from the static mapping tables below; nothing
//! supplied by a caller is interpolated into SQL.  Search terms are bound as
//! parameters and matched case-insensitively (ASCII) as plain substrings.

use agora_shared::{MembershipRole, MessageId, RoomId, RoomRef};
use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::database::{count_from_sql, ts_from_sql, uuid_from_sql, Database};
use crate::error::Result;
use crate::models::User;
use crate::users::user_from_row;

// ---------------------------------------------------------------------------
// Sorting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }

    fn sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// A collection's table of sortable fields: public name to SQL expression.
pub trait SortField: Copy + 'static {
    const FIELDS: &'static [(&'static str, Self)];

    /// The column or alias this field sorts by.
    fn sql(self) -> &'static str;

    fn parse(name: &str) -> Option<Self> {
        Self::FIELDS
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| *value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserSort {
    CreatedAt,
    LastLogin,
    Username,
    Email,
    Status,
}

impl SortField for UserSort {
    const FIELDS: &'static [(&'static str, Self)] = &[
        ("created_at", UserSort::CreatedAt),
        ("last_login", UserSort::LastLogin),
        ("username", UserSort::Username),
        ("email", UserSort::Email),
        ("status", UserSort::Status),
    ];

    fn sql(self) -> &'static str {
        match self {
            UserSort::CreatedAt => "created_at",
            UserSort::LastLogin => "last_login",
            UserSort::Username => "username",
            UserSort::Email => "email",
            UserSort::Status => "status",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomSort {
    CreatedAt,
    ModifiedAt,
    RoomName,
    Owner,
    MembersCount,
    TotalMessages,
}

impl SortField for RoomSort {
    const FIELDS: &'static [(&'static str, Self)] = &[
        ("created_at", RoomSort::CreatedAt),
        ("modified_at", RoomSort::ModifiedAt),
        ("room_name", RoomSort::RoomName),
        ("owner", RoomSort::Owner),
        ("members_count", RoomSort::MembersCount),
        ("total_messages", RoomSort::TotalMessages),
    ];

    fn sql(self) -> &'static str {
        match self {
            RoomSort::CreatedAt => "r.created_at",
            RoomSort::ModifiedAt => "r.modified_at",
            RoomSort::RoomName => "r.room_name",
            RoomSort::Owner => "r.owner",
            RoomSort::MembersCount => "members_count",
            RoomSort::TotalMessages => "total_messages",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSort {
    CreatedAt,
    Sender,
    RoomName,
}

impl SortField for MessageSort {
    const FIELDS: &'static [(&'static str, Self)] = &[
        ("created_at", MessageSort::CreatedAt),
        ("sender", MessageSort::Sender),
        ("room_name", MessageSort::RoomName),
    ];

    fn sql(self) -> &'static str {
        match self {
            MessageSort::CreatedAt => "g.timestamp",
            MessageSort::Sender => "g.user",
            MessageSort::RoomName => "r.room_name",
        }
    }
}

// ---------------------------------------------------------------------------
// Query / result types
// ---------------------------------------------------------------------------

/// A validated listing request.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery<F> {
    /// Page index (not a row offset).
    pub offset: u32,
    /// Rows per page, already checked to be in range.
    pub limit: u32,
    /// Lowercased search term; empty means no filter.
    pub search: String,
    pub sort: F,
    pub order: SortOrder,
}

impl<F> ListQuery<F> {
    fn skip(&self) -> i64 {
        i64::from(self.offset) * i64::from(self.limit)
    }

    fn order_by(&self, column: &str, id_column: &str) -> String {
        let dir = self.order.sql();
        format!("ORDER BY {column} {dir}, {id_column} {dir}")
    }
}

/// One page of results plus the filter's total row count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomMembership {
    pub room_name: String,
    pub role: MembershipRole,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    #[serde(flatten)]
    pub user: User,
    pub room_membership: Vec<RoomMembership>,
}

/// Admin view of a room: no ban list, no AI flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub id: RoomId,
    pub room_name: String,
    pub room_picture: Option<String>,
    pub room_join_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub owner: String,
    pub members: Vec<String>,
    pub members_count: u64,
    pub total_messages: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSummary {
    pub id: MessageId,
    pub room_id: RoomRef,
    pub user: Option<String>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub room_name: String,
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

const USER_FILTER: &str = "(?1 = ''
       OR instr(unicode_lower(username), ?1) > 0
       OR instr(unicode_lower(email), ?1) > 0)";

const ROOM_FILTER: &str = "r.is_ai = 0
       AND (?2 IS NULL OR r.id <> ?2)
       AND (?1 = ''
            OR instr(unicode_lower(r.room_name), ?1) > 0
            OR instr(unicode_lower(COALESCE(r.room_join_code, '')), ?1) > 0
            OR instr(unicode_lower(r.owner), ?1) > 0)";

const MESSAGE_FILTER: &str = "r.is_ai = 0
       AND (?2 IS NULL OR r.id <> ?2)
       AND (?1 = ''
            OR instr(unicode_lower(g.message), ?1) > 0
            OR instr(unicode_lower(COALESCE(g.user, '')), ?1) > 0)";

impl Database {
    /// Page through users, each annotated with the rooms they belong to.
    pub fn list_users(&self, q: &ListQuery<UserSort>) -> Result<Page<UserSummary>> {
        let total: i64 = self.conn().query_row(
            &format!("SELECT COUNT(*) FROM users WHERE {USER_FILTER}"),
            params![q.search],
            |row| row.get(0),
        )?;

        let sql = format!(
            "SELECT id, username, email, password, profile_picture, status,
                    created_at, last_login, role, is_admin, ai_room
             FROM users
             WHERE {USER_FILTER}
             {}
             LIMIT ?2 OFFSET ?3",
            q.order_by(q.sort.sql(), "id"),
        );
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(params![q.search, q.limit, q.skip()], |row| user_from_row(row, 0))?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }

        let mut items = Vec::with_capacity(users.len());
        for user in users {
            let room_membership = self.memberships_of(&user.username)?;
            items.push(UserSummary {
                user,
                room_membership,
            });
        }

        Ok(Page {
            items,
            total: count_from_sql(total),
        })
    }

    fn memberships_of(&self, username: &str) -> Result<Vec<RoomMembership>> {
        let mut stmt = self.conn().prepare(
            "SELECT r.room_name, r.owner = ?1
             FROM rooms r
             JOIN room_members m ON m.room_id = r.id
             WHERE m.username = ?1
             ORDER BY r.created_at ASC, r.id ASC",
        )?;
        let rows = stmt.query_map(params![username], |row| {
            let owner: bool = row.get(1)?;
            Ok(RoomMembership {
                room_name: row.get(0)?,
                role: if owner {
                    MembershipRole::Owner
                } else {
                    MembershipRole::Member
                },
            })
        })?;

        let mut memberships = Vec::new();
        for row in rows {
            memberships.push(row?);
        }
        Ok(memberships)
    }

    /// Page through non-AI rooms.  `exclude` hides one extra room (the
    /// system AI room) whether or not a search term is given.
    pub fn list_rooms(&self, q: &ListQuery<RoomSort>, exclude: Option<RoomId>) -> Result<Page<RoomSummary>> {
        let exclude = exclude.map(|id| id.to_string());

        let total: i64 = self.conn().query_row(
            &format!("SELECT COUNT(*) FROM rooms r WHERE {ROOM_FILTER}"),
            params![q.search, exclude],
            |row| row.get(0),
        )?;

        let sql = format!(
            "SELECT r.id, r.room_name, r.room_picture, r.room_join_code,
                    r.created_at, r.modified_at, r.owner,
                    (SELECT COUNT(*) FROM room_members m WHERE m.room_id = r.id) AS members_count,
                    (SELECT COUNT(*) FROM messages g WHERE g.room_id = r.id) AS total_messages
             FROM rooms r
             WHERE {ROOM_FILTER}
             {}
             LIMIT ?3 OFFSET ?4",
            q.order_by(q.sort.sql(), "r.id"),
        );
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(params![q.search, exclude, q.limit, q.skip()], row_to_room_summary)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        for item in &mut items {
            item.members = self.member_names(item.id)?;
        }

        Ok(Page {
            items,
            total: count_from_sql(total),
        })
    }

    fn member_names(&self, room_id: RoomId) -> Result<Vec<String>> {
        let mut stmt = self.conn().prepare(
            "SELECT username FROM room_members WHERE room_id = ?1 ORDER BY joined_at, rowid",
        )?;
        let rows = stmt.query_map(params![room_id.to_string()], |row| row.get(0))?;

        let mut names = Vec::new();
        for row in rows {
            names.push(row?);
        }
        Ok(names)
    }

    /// Page through messages joined to their room.  Messages whose room id
    /// does not name an existing room are left out, as are messages of AI
    /// rooms and of `exclude`.
    pub fn list_messages(
        &self,
        q: &ListQuery<MessageSort>,
        exclude: Option<RoomId>,
    ) -> Result<Page<MessageSummary>> {
        let exclude = exclude.map(|id| id.to_string());

        let total: i64 = self.conn().query_row(
            &format!(
                "SELECT COUNT(*)
                 FROM messages g
                 JOIN rooms r ON r.id = g.room_id
                 WHERE {MESSAGE_FILTER}"
            ),
            params![q.search, exclude],
            |row| row.get(0),
        )?;

        let sql = format!(
            "SELECT g.id, g.room_id, g.user, g.message, g.timestamp, r.room_name
             FROM messages g
             JOIN rooms r ON r.id = g.room_id
             WHERE {MESSAGE_FILTER}
             {}
             LIMIT ?3 OFFSET ?4",
            q.order_by(q.sort.sql(), "g.id"),
        );
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(params![q.search, exclude, q.limit, q.skip()], |row| {
            let id: String = row.get(0)?;
            let room_id: String = row.get(1)?;
            let ts: String = row.get(4)?;
            Ok(MessageSummary {
                id: MessageId(uuid_from_sql(0, &id)?),
                room_id: RoomRef::from_raw(room_id),
                user: row.get(2)?,
                message: row.get(3)?,
                timestamp: ts_from_sql(4, &ts)?,
                room_name: row.get(5)?,
            })
        })?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }

        Ok(Page {
            items,
            total: count_from_sql(total),
        })
    }
}

fn row_to_room_summary(row: &rusqlite::Row<'_>) -> rusqlite::Result<RoomSummary> {
    let id: String = row.get(0)?;
    let created: String = row.get(4)?;
    let modified: String = row.get(5)?;
    let members_count: i64 = row.get(7)?;
    let total_messages: i64 = row.get(8)?;

    Ok(RoomSummary {
        id: RoomId(uuid_from_sql(0, &id)?),
        room_name: row.get(1)?,
        room_picture: row.get(2)?,
        room_join_code: row.get(3)?,
        created_at: ts_from_sql(4, &created)?,
        modified_at: ts_from_sql(5, &modified)?,
        owner: row.get(6)?,
        members: Vec::new(),
        members_count: count_from_sql(members_count),
        total_messages: count_from_sql(total_messages),
    })
}
