//! Entity module - SeaORM entity definitions for the workshop tables the
//! analytics core reads, plus the `settings` table the target store writes.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod calendar_event;
pub mod category;
pub mod customer;
pub mod order;
pub mod setting;
pub mod supplier;
pub mod user;
pub mod warehouse_item;
pub mod warehouse_movement;
pub mod work_log;

// Re-export specific types to avoid conflicts
pub use calendar_event::{Entity as CalendarEvent, Model as CalendarEventModel};
pub use category::{Entity as Category, Model as CategoryModel};
pub use customer::{Entity as Customer, Model as CustomerModel};
pub use order::{Column as OrderColumn, Entity as Order, Model as OrderModel};
pub use setting::{Column as SettingColumn, Entity as Setting, Model as SettingModel};
pub use supplier::{Entity as Supplier, Model as SupplierModel};
pub use user::{Entity as User, Model as UserModel};
pub use warehouse_item::{Entity as WarehouseItem, Model as WarehouseItemModel};
pub use warehouse_movement::{Entity as WarehouseMovement, Model as WarehouseMovementModel};
pub use work_log::{Entity as WorkLog, Model as WorkLogModel};
