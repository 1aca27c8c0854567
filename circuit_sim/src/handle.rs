//! `BoardHandle`: the simulation/render concurrency seam described in spec
//! §5. The core is single-threaded cooperative — one thread runs ticks
//! serially — but a renderer needs read access to the same `Board` between
//! ticks without starving the simulation thread behind a stream of readers.
//!
//! Grounded on the reference `Simulator`'s `static mutex renderMutex,
//! renderReadyMutex;` pair: a two-lock handoff where the writer always
//! acquires a secondary "ticket" lock before the primary one, so a writer
//! waiting on the primary lock is served as soon as the current reader
//! releases it, rather than being cut in front of by a fresh reader that
//! re-acquires the primary lock first.

use parking_lot::Mutex;

use crate::board::Board;

/// Shared ownership of a `Board` across a simulation thread and any number
/// of readers (typically a renderer). Readers take only the primary lock;
/// the simulation thread takes the ticket lock first, then the primary
/// lock, so it is never starved by readers racing to reacquire the primary
/// lock between ticks.
pub struct BoardHandle {
    board: Mutex<Board>,
    ticket: Mutex<()>,
}

impl BoardHandle {
    pub fn new(board: Board) -> BoardHandle {
        BoardHandle { board: Mutex::new(board), ticket: Mutex::new(()) }
    }

    /// Acquire read/write access for the simulation thread. Blocks behind
    /// any reader currently holding the primary lock, but ahead of any
    /// reader that arrives afterward, thanks to the ticket lock.
    pub fn lock_for_write(&self) -> BoardWriteGuard<'_> {
        let ticket = self.ticket.lock();
        let board = self.board.lock();
        BoardWriteGuard { _ticket: ticket, board }
    }

    /// Acquire read-only access for a renderer. The board is not mutated
    /// while this guard is held, but the type itself does not enforce
    /// read-only-ness beyond convention (the simulation thread is the only
    /// writer by construction).
    pub fn lock_for_read(&self) -> parking_lot::MappedMutexGuard<'_, Board> {
        parking_lot::MutexGuard::map(self.board.lock(), |b| b)
    }
}

/// Held by the simulation thread across a tick. Drops the ticket lock only
/// after the primary lock is released, preserving the two-lock ordering.
pub struct BoardWriteGuard<'a> {
    _ticket: parking_lot::MutexGuard<'a, ()>,
    board: parking_lot::MutexGuard<'a, Board>,
}

impl<'a> std::ops::Deref for BoardWriteGuard<'a> {
    type Target = Board;
    fn deref(&self) -> &Board {
        &self.board
    }
}

impl<'a> std::ops::DerefMut for BoardWriteGuard<'a> {
    fn deref_mut(&mut self) -> &mut Board {
        &mut self.board
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_guard_derefs_to_board() {
        let handle = BoardHandle::new(Board::new(None));
        let mut guard = handle.lock_for_write();
        guard.extra_logic_states = true;
        drop(guard);
        assert!(handle.lock_for_read().extra_logic_states);
    }
}
