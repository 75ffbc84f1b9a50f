/// Share of completed trials as a whole percentage, rounded half up.
///
/// `None` when there is nothing to measure against.
pub fn percent(completed: usize, total: usize) -> Option<u8> {
    if total == 0 {
        return None;
    }
    let completed = completed.min(total) as u64;
    let total = total as u64;
    Some(((200 * completed + total) / (2 * total)) as u8)
}
