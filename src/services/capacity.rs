use crate::utils::AppError;

/// Pure capacity check for creating a ticket type or raising its quantity.
///
/// `sibling_quantities` is the summed remaining quantity of the event's other
/// ticket types, `sold` the count of seats already held (PENDING, VALID,
/// USED). The caller runs this inside the same unit of work as the write so
/// two organizer requests cannot both pass and then both write.
pub fn check_capacity(
    event_capacity: i32,
    sibling_quantities: i64,
    sold: i64,
    candidate_quantity: i32,
) -> Result<(), AppError> {
    let total_in_use = sibling_quantities + sold + i64::from(candidate_quantity);
    if total_in_use > i64::from(event_capacity) {
        return Err(AppError::CapacityExceeded(format!(
            "{total_in_use} seats would be committed against a capacity of {event_capacity}"
        )));
    }
    Ok(())
}

/// Symmetric check for an organizer lowering the event capacity.
pub fn check_capacity_reduction(new_capacity: i32, total_in_use: i64) -> Result<(), AppError> {
    if i64::from(new_capacity) < total_in_use {
        return Err(AppError::CapacityExceeded(format!(
            "capacity {new_capacity} is below the {total_in_use} seats already committed"
        )));
    }
    Ok(())
}
