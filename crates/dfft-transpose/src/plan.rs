//! Communicator setup and the two transpose plans.

use dfft_comm::Communicator;
use log::{debug, info};

use crate::decomposition::Decomposition;
use crate::{Direction, Domain, TransposeError};

/// A communicator bound to the axis it transposes.
///
/// Dropping or calling [`TransposePlan::release`] frees the communicator;
/// `release` takes the plan by value, so a released plan cannot be used or
/// released again.
#[derive(Debug)]
pub struct TransposePlan<C> {
    comm: C,
    direction: Direction,
}

impl<C: Communicator> TransposePlan<C> {
    pub fn new(comm: C, direction: Direction) -> Self {
        Self { comm, direction }
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    #[must_use]
    pub fn comm(&self) -> &C {
        &self.comm
    }

    #[must_use]
    pub fn chunk_elements(&self, domain: Domain) -> usize {
        self.direction.chunk_elements(domain)
    }

    pub fn release(self) {
        debug!(
            "releasing {} plan on rank {} of {}",
            self.direction.name(),
            self.comm.rank(),
            self.comm.size()
        );
    }
}

/// This rank's place in the process grid, plus both transpose plans.
#[derive(Debug)]
pub struct ProcessGrid<C> {
    cart: C,
    decomposition: Decomposition,
    coords: [usize; 2],
    row: TransposePlan<C>,
    column: TransposePlan<C>,
}

impl<C: Communicator> ProcessGrid<C> {
    /// The Cartesian communicator spanning every rank.
    #[must_use]
    pub fn cartesian(&self) -> &C {
        &self.cart
    }

    #[must_use]
    pub fn decomposition(&self) -> &Decomposition {
        &self.decomposition
    }

    #[must_use]
    pub fn dims(&self) -> [usize; 2] {
        self.decomposition.dims
    }

    #[must_use]
    pub fn domain(&self) -> Domain {
        self.decomposition.domain
    }

    /// `[c0, c1]` of this rank.
    #[must_use]
    pub fn coords(&self) -> [usize; 2] {
        self.coords
    }

    #[must_use]
    pub fn row_plan(&self) -> &TransposePlan<C> {
        &self.row
    }

    #[must_use]
    pub fn column_plan(&self) -> &TransposePlan<C> {
        &self.column
    }

    /// Frees the column plan, then the row plan, then the Cartesian
    /// communicator: the reverse of the order `build_process_grid` made them.
    pub fn release(self) {
        let Self {
            cart, row, column, ..
        } = self;
        column.release();
        row.release();
        debug!("releasing cartesian communicator on rank {}", cart.rank());
        drop(cart);
    }
}

/// Builds the Cartesian communicator for `decomposition` and splits it into
/// the row group (same `c1`, ordered by `c0`) and the column group (same
/// `c0`, ordered by `c1`).
///
/// Collective over `world`: every rank must call it with the same
/// decomposition.
pub fn build_process_grid<C: Communicator>(
    world: &C,
    decomposition: &Decomposition,
) -> Result<ProcessGrid<C>, TransposeError> {
    let (cart, coords) = world.create_cartesian(decomposition.dims)?;
    let [c0, c1] = coords;
    let row = TransposePlan::new(cart.split(c1, c0)?, Direction::Row);
    let column = TransposePlan::new(cart.split(c0, c1)?, Direction::Column);
    if cart.is_root() {
        info!(
            "{} process grid {}x{} ready",
            decomposition.kind.name(),
            decomposition.dims[0],
            decomposition.dims[1]
        );
    }
    debug!(
        "rank {} at ({c0},{c1}): row group {} of {}, column group {} of {}",
        cart.rank(),
        row.comm().rank(),
        row.comm().size(),
        column.comm().rank(),
        column.comm().size()
    );
    Ok(ProcessGrid {
        cart,
        decomposition: *decomposition,
        coords,
        row,
        column,
    })
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use dfft_comm::{CommError, Communicator, SelfComm, ThreadUniverse};

    use super::build_process_grid;
    use crate::{DecompositionKind, Direction, plan_decomposition};

    #[test]
    fn single_rank_grid_uses_identity_groups() {
        let plan = plan_decomposition(4, 1, DecompositionKind::Slab).expect("plan");
        let grid = build_process_grid(&SelfComm, &plan).expect("grid");
        assert_eq!(grid.coords(), [0, 0]);
        assert_eq!(grid.row_plan().direction(), Direction::Row);
        assert_eq!(grid.column_plan().direction(), Direction::Column);
        assert_eq!(grid.row_plan().comm().size(), 1);
        grid.release();
    }

    #[test]
    fn rod_grid_groups_have_grid_dimensions() {
        let plan = plan_decomposition(8, 8, DecompositionKind::Rod).expect("plan");
        let universe = ThreadUniverse::new(8).expect("universe");
        let layouts = universe
            .run(|world| {
                let grid = build_process_grid(&world, &plan).expect("grid");
                let layout = (
                    grid.coords(),
                    grid.row_plan().comm().size(),
                    grid.row_plan().comm().rank(),
                    grid.column_plan().comm().size(),
                    grid.column_plan().comm().rank(),
                );
                grid.release();
                layout
            })
            .expect("ranks should start");
        for (rank, ([c0, c1], row_size, row_rank, col_size, col_rank)) in
            layouts.into_iter().enumerate()
        {
            assert_eq!([c0, c1], [rank / 4, rank % 4]);
            assert_eq!((row_size, row_rank), (2, c0));
            assert_eq!((col_size, col_rank), (4, c1));
        }
    }

    /// Single-rank communicator that logs its name when freed.
    struct Tracked {
        name: &'static str,
        splits: Rc<Cell<usize>>,
        freed: Rc<RefCell<Vec<&'static str>>>,
    }

    impl Tracked {
        fn named(&self, name: &'static str) -> Self {
            Self {
                name,
                splits: Rc::clone(&self.splits),
                freed: Rc::clone(&self.freed),
            }
        }
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.freed.borrow_mut().push(self.name);
        }
    }

    impl Communicator for Tracked {
        fn rank(&self) -> usize {
            0
        }

        fn size(&self) -> usize {
            1
        }

        fn barrier(&self) -> Result<(), CommError> {
            Ok(())
        }

        fn all_to_all(
            &self,
            send: &[f64],
            recv: &mut [f64],
            _chunk: usize,
        ) -> Result<(), CommError> {
            recv.copy_from_slice(send);
            Ok(())
        }

        fn all_reduce_sum(&self, local: f64) -> Result<f64, CommError> {
            Ok(local)
        }

        fn abort(&self, code: i32) {
            panic!("abort {code}");
        }

        fn create_cartesian(&self, _dims: [usize; 2]) -> Result<(Self, [usize; 2]), CommError> {
            Ok((self.named("cartesian"), [0, 0]))
        }

        fn split(&self, _color: usize, _key: usize) -> Result<Self, CommError> {
            let made = self.splits.replace(self.splits.get() + 1);
            Ok(self.named(if made == 0 { "row" } else { "column" }))
        }
    }

    #[test]
    fn release_frees_in_reverse_creation_order() {
        let world = Tracked {
            name: "world",
            splits: Rc::new(Cell::new(0)),
            freed: Rc::new(RefCell::new(Vec::new())),
        };
        let plan = plan_decomposition(4, 1, DecompositionKind::Slab).expect("plan");
        let grid = build_process_grid(&world, &plan).expect("grid");
        assert_eq!(grid.row_plan().comm().name, "row");
        assert_eq!(grid.column_plan().comm().name, "column");
        assert!(world.freed.borrow().is_empty());
        grid.release();
        assert_eq!(*world.freed.borrow(), ["column", "row", "cartesian"]);
    }
}
