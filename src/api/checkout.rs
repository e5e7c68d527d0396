use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;
use validator::Validate;

use super::cart::load_cart;
use super::dto::{CheckoutRequest, CheckoutResponse};
use super::extract::CurrentTenant;
use super::response::{created, ApiError, ApiResponse, ApiResult};
use super::AppState;
use crate::domain::{Customer, Order, OrderCustomer, OrderLine, Product};
use crate::error::CommerceError;
use crate::infra::publish_all;
use crate::payments::{GatewayCode, PaymentRequest};

/// Turns the session cart into a pending order and hands it to the chosen gateway.
///
/// The order is written before the gateway is called. If the gateway call fails the
/// order stays pending, the cart is kept and the caller gets a 502.
pub async fn checkout(
    State(state): State<Arc<AppState>>,
    CurrentTenant(tenant): CurrentTenant,
    Json(req): Json<CheckoutRequest>,
) -> ApiResult<(StatusCode, ApiResponse<CheckoutResponse>)> {
    req.validate()?;
    let gateway: GatewayCode = req.gateway.parse()?;

    let (cart, products) = load_cart(&state, &tenant, &req.session_id).await?;
    if cart.is_empty() {
        return Err(ApiError::bad_request("cart is empty"));
    }
    let by_id: HashMap<Uuid, &Product> = products.iter().map(|p| (p.id, p)).collect();
    let mut lines = Vec::with_capacity(cart.items().len());
    for line in cart.items() {
        let product = by_id.get(&line.product_id).ok_or(CommerceError::NotFound("product"))?;
        if !product.is_active() {
            return Err(CommerceError::Conflict(format!("{} is no longer available", product.name)).into());
        }
        if !product.can_fulfil(line.quantity) {
            return Err(CommerceError::InsufficientStock(product.sku.clone()).into());
        }
        lines.push(OrderLine {
            product_id: product.id,
            sku: product.sku.clone(),
            name: product.name.clone(),
            quantity: line.quantity,
            unit_price: product.price,
        });
    }

    state.payments.ensure_configured(tenant.id, gateway).await?;

    let customer = state.store
        .upsert_customer(&Customer::new(tenant.id, &req.customer.email, &req.customer.name, req.customer.phone.clone()))
        .await?;
    let mut order = Order::place(
        &tenant,
        OrderCustomer {
            customer_id: Some(customer.id),
            email: req.customer.email.clone(),
            name: req.customer.name.clone(),
            phone: req.customer.phone.clone(),
        },
        req.shipping_address.clone(),
        lines,
    )
    .map_err(|e| ApiError::bad_request(e.to_string()))?;
    state.store.insert_order(&order).await?;
    publish_all(state.events.as_ref(), &tenant.slug, order.take_events()).await;
    tracing::info!(tenant = %tenant.id, order_id = %order.id, gateway = %gateway, total = %order.total, "order placed");

    let payment = state.payments.process_payment(tenant.id, gateway, &PaymentRequest {
        order_id: order.id,
        order_number: order.order_number.clone(),
        amount: order.total_money(),
        customer_name: order.customer_name.clone(),
        customer_email: order.customer_email.clone(),
        description: format!("{} order {}", tenant.name, order.order_number),
        return_url: req.return_url.clone(),
        cancel_url: req.cancel_url.clone(),
        notify_url: format!("{}/api/v1/webhooks/payments/{}", state.config.public_base_url, gateway),
    })
    .await?;

    order.attach_payment(gateway.as_str(), payment.reference.clone());
    state.store.update_order(&order).await?;
    state.store.clear_cart(tenant.id, &req.session_id).await?;

    Ok(created(CheckoutResponse { order, payment }))
}
