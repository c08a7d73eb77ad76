//! Sample accounts and listings for demo runs.

use tracing::{debug, info};

use crate::models::product::{Category, NewProduct, DEFAULT_BRAND};
use crate::models::user::{NewUser, User};
use crate::services::auth::AuthError;
use crate::store::UserFilter;
use crate::AppState;

pub const DEMO_PASSWORD: &str = "password123";

struct SeedUser {
    email: &'static str,
    first_name: &'static str,
    last_name: &'static str,
    phone_number: &'static str,
}

struct SeedProduct {
    title: &'static str,
    description: &'static str,
    price: f64,
    category: Category,
    image: &'static str,
    stock: i32,
    rating: f64,
    /// Index into `USERS`.
    seller: usize,
}

const USERS: [SeedUser; 2] = [
    SeedUser {
        email: "john@example.com",
        first_name: "John",
        last_name: "Smith",
        phone_number: "+1-555-0101",
    },
    SeedUser {
        email: "jane@example.com",
        first_name: "Jane",
        last_name: "Doe",
        phone_number: "+1-555-0102",
    },
];

const PRODUCTS: [SeedProduct; 4] = [
    SeedProduct {
        title: "Wireless Headphones",
        description: "High-quality wireless headphones with noise cancellation",
        price: 199.99,
        category: Category::Electronics,
        image: "https://via.placeholder.com/400x400?text=Wireless+Headphones",
        stock: 15,
        rating: 4.5,
        seller: 0,
    },
    SeedProduct {
        title: "Smart Watch Pro",
        description: "Advanced fitness tracking smartwatch with heart rate monitor",
        price: 299.99,
        category: Category::Electronics,
        image: "https://via.placeholder.com/400x400?text=Smart+Watch",
        stock: 8,
        rating: 4.7,
        seller: 0,
    },
    SeedProduct {
        title: "Organic Cotton T-Shirt",
        description: "Premium organic cotton t-shirt, eco-friendly and comfortable",
        price: 29.99,
        category: Category::Fashion,
        image: "https://via.placeholder.com/400x400?text=Cotton+Shirt",
        stock: 50,
        rating: 4.3,
        seller: 1,
    },
    SeedProduct {
        title: "Minimalist Desk Lamp",
        description: "Modern LED desk lamp with adjustable brightness",
        price: 49.99,
        category: Category::Home,
        image: "https://via.placeholder.com/400x400?text=Desk+Lamp",
        stock: 22,
        rating: 4.6,
        seller: 1,
    },
];

/// Load the sample data. Accounts that already exist are left alone along
/// with their products, so running this twice is harmless.
pub async fn load_demo_data(state: &AppState) -> Result<usize, AuthError> {
    let users = state.store.users();
    let products = state.store.products();
    let mut inserted = 0;

    for (index, seed) in USERS.iter().enumerate() {
        if users
            .find_one(&UserFilter::Email(seed.email.to_string()))
            .await?
            .is_some()
        {
            debug!(email = seed.email, "Demo user already present");
            continue;
        }

        let user: User = users
            .insert(NewUser {
                email: seed.email.to_string(),
                password_hash: Some(state.hasher.hash(DEMO_PASSWORD).await?),
                first_name: seed.first_name.to_string(),
                last_name: seed.last_name.to_string(),
                phone_number: Some(seed.phone_number.to_string()),
            })
            .await?;

        for item in PRODUCTS.iter().filter(|p| p.seller == index) {
            products
                .insert(NewProduct {
                    title: item.title.to_string(),
                    description: item.description.to_string(),
                    price: item.price,
                    mrp: item.price,
                    brand: DEFAULT_BRAND.to_string(),
                    category: item.category,
                    images: vec![item.image.to_string()],
                    stock: item.stock,
                    seller: user.id.clone(),
                    rating: item.rating,
                    exchange_or_return_eligibility: false,
                    published: true,
                })
                .await?;
            inserted += 1;
        }
    }

    info!(products = inserted, "Demo data loaded");
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::auth::AuthService;
    use crate::store::ProductFilter;
    use crate::Policies;

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let state = AppState::for_tests(Policies::default());

        assert_eq!(load_demo_data(&state).await.unwrap(), 4);
        assert_eq!(load_demo_data(&state).await.unwrap(), 0);

        let all = ProductFilter::default();
        assert_eq!(state.store.products().count(&all).await.unwrap(), 4);
        assert_eq!(state.store.users().count(&UserFilter::All).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn demo_accounts_can_log_in() {
        let state = AppState::for_tests(Policies::default());
        load_demo_data(&state).await.unwrap();

        let session = AuthService::new(&state)
            .login("jane@example.com", DEMO_PASSWORD)
            .await
            .unwrap();
        assert_eq!(session.user.first_name, "Jane");
    }
}
