//! Applies an interpreter reply to a cart

use std::collections::HashSet;

use rust_decimal::Decimal;

use super::{Cart, CartLine, DeltaLine, ProductId};
use crate::error::ReconciliationError;
use crate::interpreter::{ActionType, InterpreterReply};

/// Produce the cart that results from applying `reply` to `cart`
///
/// The input cart is never modified. `add` merges into existing lines by
/// summing quantity and total price, `remove` drops every line whose id the
/// delta names, `checkout` empties the cart and `none` returns it unchanged.
///
/// # Errors
///
/// Returns [`ReconciliationError`] if an `add` delta contains an entry that
/// cannot be read, priced or keyed, or whose sum would overflow. Nothing is
/// applied in that case.
pub fn reconcile(cart: &Cart, reply: &InterpreterReply) -> Result<Cart, ReconciliationError> {
    let next = match reply.action {
        ActionType::Add => add(cart, &reply.delta)?,
        ActionType::Remove => remove(cart, &reply.delta),
        ActionType::Checkout => Cart::new(),
        ActionType::None => cart.clone(),
    };

    tracing::debug!(
        action = %reply.action,
        before = cart.len(),
        after = next.len(),
        "cart reconciled"
    );

    Ok(next)
}

fn add(cart: &Cart, delta: &[DeltaLine]) -> Result<Cart, ReconciliationError> {
    // Validate everything first so a bad entry never leaves a half-applied cart
    let additions = delta
        .iter()
        .enumerate()
        .map(|(index, entry)| to_line(index, entry))
        .collect::<Result<Vec<_>, _>>()?;

    // The cart total bounds every line total, so checking it covers both
    let mut total = cart.grand_total();
    let mut lines = cart.lines.clone();
    for (index, addition) in additions.into_iter().enumerate() {
        total = total
            .checked_add(addition.total_price)
            .ok_or(ReconciliationError::PriceOverflow(index))?;

        match lines.iter_mut().find(|l| l.product_id == addition.product_id) {
            Some(existing) => {
                existing.quantity = existing
                    .quantity
                    .checked_add(addition.quantity)
                    .ok_or(ReconciliationError::QuantityOverflow(index))?;
                existing.total_price = existing
                    .total_price
                    .checked_add(addition.total_price)
                    .ok_or(ReconciliationError::PriceOverflow(index))?;
            }
            None => lines.push(addition),
        }
    }

    Ok(Cart { lines })
}

fn remove(cart: &Cart, delta: &[DeltaLine]) -> Cart {
    let ids: HashSet<&ProductId> = delta
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            if let Some(reason) = &entry.invalid {
                tracing::debug!(index, reason = %reason, "remove entry partly unreadable");
            }
            entry.product_id.as_ref()
        })
        .collect();

    Cart {
        lines: cart
            .lines
            .iter()
            .filter(|l| !ids.contains(&l.product_id))
            .cloned()
            .collect(),
    }
}

fn to_line(index: usize, entry: &DeltaLine) -> Result<CartLine, ReconciliationError> {
    if let Some(reason) = &entry.invalid {
        return Err(ReconciliationError::InvalidEntry {
            index,
            reason: reason.clone(),
        });
    }

    let product_id = entry
        .product_id
        .clone()
        .ok_or(ReconciliationError::MissingProductId(index))?;

    let quantity = entry
        .quantity
        .ok_or(ReconciliationError::MissingQuantity(index))?;
    if quantity <= 0 {
        return Err(ReconciliationError::NonPositiveQuantity { index, quantity });
    }

    let total_price = entry
        .total_price
        .ok_or(ReconciliationError::MissingTotalPrice(index))?;
    if total_price < Decimal::ZERO {
        return Err(ReconciliationError::NegativeTotalPrice(index));
    }

    let name = entry
        .name
        .clone()
        .unwrap_or_else(|| product_id.to_string());

    Ok(CartLine {
        product_id,
        name,
        quantity: quantity.unsigned_abs(),
        total_price,
    })
}
