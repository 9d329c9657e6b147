pub mod entities;

use crate::db::errors::StoreError;
use crate::db::product::{Product, ProductId};
use crate::db::LocalStore;
use async_trait::async_trait;
use entities::product;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveValue, ConnectionTrait, Database as SeaOrmDB, DatabaseConnection, DbErr, EntityTrait,
    QueryOrder, Schema,
};
use tracing::info;

#[derive(Debug)]
pub struct RelationalStore {
    pub connection: DatabaseConnection,
}

fn row_id(id: ProductId) -> Result<i32, StoreError> {
    i32::try_from(id).map_err(|_| StoreError::IdOutOfRange(id))
}

fn active_model(row: &Product) -> Result<product::ActiveModel, StoreError> {
    let id = if row.has_id() {
        ActiveValue::Set(row_id(row.id)?)
    } else {
        ActiveValue::NotSet
    };
    Ok(product::ActiveModel {
        id,
        name: ActiveValue::Set(row.name.clone()),
        quantity: ActiveValue::Set(row.quantity),
        price: ActiveValue::Set(row.price),
    })
}

fn replace_on_conflict() -> OnConflict {
    OnConflict::column(product::Column::Id)
        .update_columns([
            product::Column::Name,
            product::Column::Quantity,
            product::Column::Price,
        ])
        .to_owned()
}

impl RelationalStore {
    pub fn init(connection: DatabaseConnection) -> Self {
        Self { connection }
    }

    /// Connects and creates the `products` table when it does not exist yet.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let connection = SeaOrmDB::connect(url).await?;
        let backend = connection.get_database_backend();
        let mut statement = Schema::new(backend).create_table_from_entity(product::Entity);
        statement.if_not_exists();
        connection.execute(backend.build(&statement)).await?;
        info!(?backend, "connected to relational product store");
        Ok(Self::init(connection))
    }
}

#[async_trait]
impl LocalStore for RelationalStore {
    async fn get_all(&self) -> Result<Vec<Product>, StoreError> {
        let products = product::Entity::find()
            .order_by_asc(product::Column::Id)
            .all(&self.connection)
            .await?;
        Ok(products.into_iter().map(|prod| prod.into()).collect())
    }

    async fn insert(&self, new_product: &Product) -> Result<ProductId, StoreError> {
        let model = active_model(new_product)?;
        let result = product::Entity::insert(model)
            .on_conflict(replace_on_conflict())
            .exec(&self.connection)
            .await?;
        // an upsert that hit an existing row does not move the last insert id
        if new_product.has_id() {
            return Ok(new_product.id);
        }
        Ok(result.last_insert_id as ProductId)
    }

    async fn insert_all(&self, products: &[Product]) -> Result<(), StoreError> {
        if products.is_empty() {
            return Ok(());
        }
        let models = products
            .iter()
            .map(active_model)
            .collect::<Result<Vec<_>, _>>()?;
        product::Entity::insert_many(models)
            .on_conflict(replace_on_conflict())
            .exec(&self.connection)
            .await?;
        Ok(())
    }

    async fn update(&self, changed: &Product) -> Result<(), StoreError> {
        let model = active_model(changed)?;
        match product::Entity::update(model).exec(&self.connection).await {
            Ok(_) => Ok(()),
            Err(DbErr::RecordNotUpdated) => Err(StoreError::UnknownProduct),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, removed: &Product) -> Result<(), StoreError> {
        product::Entity::delete_by_id(row_id(removed.id)?)
            .exec(&self.connection)
            .await?;
        Ok(())
    }
}
