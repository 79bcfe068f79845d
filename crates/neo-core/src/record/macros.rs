/// Declares a write-through record type.
///
/// The generated struct mirrors one row of `table`. It has an immutable key
/// and one typed getter and setter per field. A setter updates the in-memory
/// value and enqueues exactly one store update; it never waits for the store.
///
/// ```rust,ignore
/// define_record! {
///     /// Per-server settings.
///     pub struct ServerConfig in "servers" {
///         key server_id: i64;
///         prefix: String => set_prefix,
///         starboard: bool => set_starboard,
///     }
/// }
///
/// let config = ServerConfig::from_row(&row, link.queue())?;
/// config.set_prefix("?".to_owned());
/// assert_eq!(config.prefix(), "?");
/// ```
///
/// Field types must convert to and from [`Value`](crate::record::Value)
/// (see [`FromValue`](crate::record::FromValue)).
#[macro_export]
macro_rules! define_record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident in $table:literal {
            key $key:ident : $key_ty:ty;
            $(
                $(#[$field_meta:meta])*
                $field:ident : $ty:ty => $setter:ident
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $key: $key_ty,
            $( $field: $crate::record::__private::RwLock<$crate::record::__private::Slot<$ty>>, )*
            queue: $crate::record::WriteQueue,
        }

        impl $name {
            /// The row key.
            pub fn $key(&self) -> $key_ty {
                ::std::clone::Clone::clone(&self.$key)
            }

            $(
                $(#[$field_meta])*
                pub fn $field(&self) -> $ty {
                    ::std::clone::Clone::clone(&self.$field.read().value)
                }

                #[doc = concat!("Sets `", stringify!($field), "` and queues the write to the store.")]
                pub fn $setter(&self, value: $ty) {
                    // Pushing under the field lock keeps queue order equal to assignment order.
                    let mut slot = self.$field.write();
                    let stored = $crate::record::Value::from(::std::clone::Clone::clone(&value));
                    slot.value = value;
                    slot.assignments += 1;
                    self.queue.push($crate::record::Update {
                        row: $crate::record::Record::row_ref(self),
                        column: stringify!($field),
                        value: stored,
                    });
                }
            )*

            /// Resets `column` to its store default and applies the result locally.
            ///
            /// The reset goes through the same queue as the setters, so it lands
            /// after every write made before it. If the field is assigned while
            /// the reset is in flight, the newer value is kept.
            pub async fn reset_field(&self, column: &str) -> $crate::error::RecordResult<()> {
                let (column, assignments, pending) = self.begin_reset(column)?;
                let value = pending.value().await?;
                self.apply_reset(column, assignments, &value)
            }

            /// Waits until every write queued so far has been handled.
            pub async fn flush(&self) -> $crate::error::RecordResult<()> {
                self.queue.flush().await.map_err(::std::convert::Into::into)
            }

            fn begin_reset(
                &self,
                column: &str,
            ) -> $crate::error::RecordResult<(&'static str, u64, $crate::record::PendingReset)> {
                $(
                    if column == stringify!($field) {
                        // Enqueued under the field lock, like the setters.
                        let slot = self.$field.write();
                        let pending = self
                            .queue
                            .begin_reset($crate::record::Record::row_ref(self), stringify!($field))?;
                        return Ok((stringify!($field), slot.assignments, pending));
                    }
                )*
                Err($crate::error::RecordError::UnknownField {
                    record: stringify!($name),
                    field: column.to_owned(),
                })
            }

            /// Applies a reset value unless the field was assigned after the reset was queued.
            fn apply_reset(
                &self,
                column: &'static str,
                assignments: u64,
                value: &$crate::record::Value,
            ) -> $crate::error::RecordResult<()> {
                $(
                    if column == stringify!($field) {
                        let mut slot = self.$field.write();
                        if slot.assignments == assignments {
                            slot.value = $crate::record::convert_value(column, value)?;
                        }
                        return Ok(());
                    }
                )*
                Err($crate::error::RecordError::UnknownField {
                    record: stringify!($name),
                    field: column.to_owned(),
                })
            }
        }

        impl $crate::record::Record for $name {
            const TABLE: &'static str = $table;
            const KEY_COLUMN: &'static str = stringify!($key);
            const FIELDS: &'static [&'static str] = &[$(stringify!($field)),*];

            type Key = $key_ty;

            fn key(&self) -> &Self::Key {
                &self.$key
            }

            fn queue(&self) -> &$crate::record::WriteQueue {
                &self.queue
            }

            fn from_row(
                row: &$crate::record::Row,
                queue: $crate::record::WriteQueue,
            ) -> $crate::error::RecordResult<Self> {
                Ok(Self {
                    $key: $crate::record::column_value(row, $table, stringify!($key))?,
                    $(
                        $field: $crate::record::__private::RwLock::new(
                            $crate::record::__private::Slot::new(
                                $crate::record::column_value(row, $table, stringify!($field))?,
                            ),
                        ),
                    )*
                    queue,
                })
            }

            fn snapshot(&self) -> $crate::record::Row {
                let mut row = $crate::record::Row::new();
                row.insert(
                    stringify!($key).to_owned(),
                    $crate::record::Value::from(::std::clone::Clone::clone(&self.$key)),
                );
                $(
                    row.insert(
                        stringify!($field).to_owned(),
                        $crate::record::Value::from(self.$field()),
                    );
                )*
                row
            }
        }

        impl ::std::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(f, "<{} {}={:?}>", stringify!($name), stringify!($key), self.$key)
            }
        }
    };
}
