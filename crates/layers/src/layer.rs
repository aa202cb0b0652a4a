/// The two disjoint marker collections a map can show.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MarkerLayer {
    Clusters,
    Individuals,
}
