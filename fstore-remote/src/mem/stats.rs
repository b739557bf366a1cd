use std::sync::atomic::{AtomicU64, Ordering};

/// Per-operation call counters of a [`MemSession`](super::MemSession).
#[derive(Debug, Default)]
pub struct CallStats {
    pub new_table: AtomicU64,
    pub open_table: AtomicU64,
    pub initialize: AtomicU64,
    pub add_data: AtomicU64,
    pub update: AtomicU64,
    pub number_of_rows: AtomicU64,
    pub where_list: AtomicU64,
    pub read_coordinates: AtomicU64,
    pub close: AtomicU64,
    pub save_file: AtomicU64,
    pub link_file_annotation: AtomicU64,
    pub delete_object: AtomicU64,
}

/// Point-in-time copy of [`CallStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallStatsSnapshot {
    pub new_table: u64,
    pub open_table: u64,
    pub initialize: u64,
    pub add_data: u64,
    pub update: u64,
    pub number_of_rows: u64,
    pub where_list: u64,
    pub read_coordinates: u64,
    pub close: u64,
    pub save_file: u64,
    pub link_file_annotation: u64,
    pub delete_object: u64,
}

impl CallStatsSnapshot {
    /// Calls that modify table contents.
    pub fn table_writes(&self) -> u64 {
        self.add_data + self.update
    }

    /// Calls that reach a table handle at all.
    pub fn table_calls(&self) -> u64 {
        self.initialize
            + self.add_data
            + self.update
            + self.number_of_rows
            + self.where_list
            + self.read_coordinates
    }
}

impl CallStats {
    #[inline]
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CallStatsSnapshot {
        CallStatsSnapshot {
            new_table: self.new_table.load(Ordering::Relaxed),
            open_table: self.open_table.load(Ordering::Relaxed),
            initialize: self.initialize.load(Ordering::Relaxed),
            add_data: self.add_data.load(Ordering::Relaxed),
            update: self.update.load(Ordering::Relaxed),
            number_of_rows: self.number_of_rows.load(Ordering::Relaxed),
            where_list: self.where_list.load(Ordering::Relaxed),
            read_coordinates: self.read_coordinates.load(Ordering::Relaxed),
            close: self.close.load(Ordering::Relaxed),
            save_file: self.save_file.load(Ordering::Relaxed),
            link_file_annotation: self.link_file_annotation.load(Ordering::Relaxed),
            delete_object: self.delete_object.load(Ordering::Relaxed),
        }
    }

    /// Reset every counter to zero.
    pub fn reset(&self) {
        for counter in [
            &self.new_table,
            &self.open_table,
            &self.initialize,
            &self.add_data,
            &self.update,
            &self.number_of_rows,
            &self.where_list,
            &self.read_coordinates,
            &self.close,
            &self.save_file,
            &self.link_file_annotation,
            &self.delete_object,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
