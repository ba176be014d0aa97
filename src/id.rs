use uuid::Uuid;

/// Time-ordered id for locally created records.
pub fn new_uuid_v7() -> String {
    Uuid::now_v7().to_string()
}

/// Random id for queue entries, independent of any server-assigned id.
pub fn new_uuid_v4() -> String {
    Uuid::new_v4().to_string()
}
