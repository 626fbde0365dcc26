//! Backend REST paths.

use petadmin_shared::{RecordId, ResourceKind};

pub const LOGIN: &str = "/auth/login";

/// `/<resource>`
pub fn collection(kind: ResourceKind) -> String {
    format!("/{}", kind.path())
}

/// `/<resource>/paginated?page=&size=`
pub fn paginated(kind: ResourceKind, page: u64, size: u64) -> String {
    format!("/{}/paginated?page={page}&size={size}", kind.path())
}

/// `/<resource>/search?keyword=&page=&size=`
pub fn search(kind: ResourceKind, keyword: &str, page: u64, size: u64) -> String {
    format!(
        "/{}/search?keyword={}&page={page}&size={size}",
        kind.path(),
        urlencoding::encode(keyword.trim())
    )
}

/// `/<resource>/{id}`
pub fn record(kind: ResourceKind, id: RecordId) -> String {
    format!("/{}/{id}", kind.path())
}

pub fn ban_player(id: RecordId) -> String {
    format!("{}/ban", record(ResourceKind::Players, id))
}

pub fn unban_player(id: RecordId) -> String {
    format!("{}/unban", record(ResourceKind::Players, id))
}
