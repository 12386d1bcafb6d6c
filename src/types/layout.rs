//! The layout model: field layouts of composite types.
//!
//! A composite's shape is a *skeleton* of *bones*; a bone is a leaf field
//! type, an anonymous struct, or an anonymous union. Names attach through a
//! *field map* whose arrows point at *endpoints*: short index sequences
//! selecting a bone at each nesting level. Traversal paths (offset vs
//! bitcast at each step) are derived on demand, never stored.

use std::fmt;
use std::hash::{Hash, Hasher};

use arrayvec::ArrayVec;
use bitflags::bitflags;

use super::ty::Type;
use super::MAX_DEPTH;

/// The in-band terminator of the C-era endpoint encoding. Kept as the
/// exclusive upper bound for valid field indices.
pub const ENDPOINT_END_INDEX: u16 = 0xFFFF;

/// The maximum number of fields in the root of a single skeleton.
pub const MAX_FIELDS: usize = ENDPOINT_END_INDEX as usize - 1;

bitflags! {
  /// Modifier bits on a bone.
  #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
  pub struct BoneTraits: u8 {
    /// The bone's fields are laid out without padding.
    const PACKED = 1;
  }
}

bitflags! {
  /// Modifier bits on a whole layout.
  #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
  pub struct LayoutTraits: u8 {
    /// The composite is laid out without padding.
    const PACKED = 1;
  }
}

/// A sequence of bone indices identifying a field within a skeleton.
/// Supports up to [`MAX_DEPTH`] levels of nesting.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Endpoint {
  indices: ArrayVec<u16, MAX_DEPTH>,
}

impl Endpoint {
  /// An empty endpoint.
  #[must_use] pub fn new() -> Endpoint {
    Endpoint::default()
  }

  /// Construct an endpoint from a list of indices. Fails if more than
  /// [`MAX_DEPTH`] indices are given.
  #[must_use] pub fn from_indices(indices: &[u16]) -> Option<Endpoint> {
    if indices.len() > MAX_DEPTH { return None }
    let mut endpoint = Endpoint::new();
    endpoint.indices.try_extend_from_slice(indices).ok()?;
    Some(endpoint)
  }

  /// Append an index. Fails at capacity, leaving the endpoint unchanged.
  pub fn add_index(&mut self, index: u16) -> bool {
    self.indices.try_push(index).is_ok()
  }

  /// Increment the last index, for walking to the next sibling field.
  pub fn increment(&mut self) {
    let last = self.indices.last_mut().expect("increment() on empty endpoint");
    *last += 1;
  }

  /// Number of indices.
  #[must_use] pub fn len(&self) -> usize { self.indices.len() }

  /// Whether the endpoint has no indices yet.
  #[must_use] pub fn is_empty(&self) -> bool { self.indices.is_empty() }

  /// The index at nesting level `depth`, if present.
  #[must_use] pub fn get(&self, depth: usize) -> Option<u16> {
    self.indices.get(depth).copied()
  }

  /// The indices as a slice.
  #[must_use] pub fn indices(&self) -> &[u16] { &self.indices }
}

/// One step of a resolved path: how to get from one endpoint index to the
/// next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Waypoint {
  /// Advance to member `index` of a struct-like bone.
  Offset(usize),
  /// Reinterpret in place, for members of union-like bones.
  Bitcast,
}

/// How to arrive at an endpoint, one waypoint per endpoint index.
pub type Path = ArrayVec<Waypoint, MAX_DEPTH>;

/// A single arrow from a field name to a location.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldArrow {
  /// Name of the field.
  pub name: String,
  /// Where the name maps to.
  pub endpoint: Endpoint,
}

/// Associates field names to endpoints.
#[derive(Clone, Debug)]
pub struct FieldMap {
  /// Arrows in declaration order.
  pub arrows: Vec<FieldArrow>,
  // Whether the i-th arrow points at endpoint [i] for every i so far.
  is_simple: bool,
}

impl Default for FieldMap {
  fn default() -> FieldMap { FieldMap::new() }
}

impl FieldMap {
  /// An empty field map.
  #[must_use] pub fn new() -> FieldMap {
    FieldMap { arrows: Vec::new(), is_simple: true }
  }

  /// Add an arrow. Updates the cached simplicity: a map stays simple only
  /// while each successive arrow points at the next depth-one endpoint
  /// (`[0]`, `[1]`, ...).
  pub fn add(&mut self, name: impl Into<String>, endpoint: Endpoint) {
    if self.is_simple
      && (endpoint.get(0) != Some(self.arrows.len() as u16) || endpoint.len() != 1)
    {
      self.is_simple = false;
    }
    self.arrows.push(FieldArrow { name: name.into(), endpoint });
  }

  /// Whether this map describes a flat struct or union.
  #[must_use] pub fn is_simple(&self) -> bool { self.is_simple }

  /// Find the endpoint a name points to.
  #[must_use] pub fn find(&self, name: &str) -> Option<&Endpoint> {
    self.arrows.iter().find(|arrow| arrow.name == name).map(|arrow| &arrow.endpoint)
  }

  /// Find the first name that points to an endpoint, for diagnostics.
  #[must_use] pub fn name_of_endpoint(&self, endpoint: &Endpoint) -> Option<&str> {
    self.arrows.iter()
      .find(|arrow| &arrow.endpoint == endpoint)
      .map(|arrow| arrow.name.as_str())
  }

  /// Number of arrows. Only significant for simple layouts.
  #[must_use] pub fn count(&self) -> usize { self.arrows.len() }

  /// Name of the arrow at `index`. Only significant for simple layouts.
  #[must_use] pub fn name_at_index(&self, index: usize) -> &str {
    &self.arrows[index].name
  }

  /// Whether two field maps have pairwise matching arrow sequences.
  #[must_use] pub fn identical(&self, other: &FieldMap) -> bool {
    self.is_simple == other.is_simple && self.arrows == other.arrows
  }
}

impl Hash for FieldMap {
  fn hash<H: Hasher>(&self, state: &mut H) {
    for arrow in &self.arrows { arrow.hash(state) }
  }
}

/// A node in a layout skeleton.
#[derive(Clone, Debug)]
pub struct Bone {
  /// Modifier bits (`packed`).
  pub traits: BoneTraits,
  /// What the bone is.
  pub kind: BoneKind,
}

/// The three bone shapes.
#[derive(Clone, Debug)]
pub enum BoneKind {
  /// A leaf field of the given type.
  Field(Type),
  /// An anonymous struct; each child sits at a distinct offset.
  Struct(Skeleton),
  /// An anonymous union; children overlap at offset zero.
  Union(Skeleton),
}

impl Bone {
  /// Whether a polymorphic variable occurs anywhere inside this bone.
  #[must_use] pub fn has_polymorph(&self) -> bool {
    match &self.kind {
      BoneKind::Field(ty) => ty.has_polymorph(),
      BoneKind::Struct(children) | BoneKind::Union(children) => children.has_polymorph(),
    }
  }

  /// Whether two bones are structurally identical.
  #[must_use] pub fn identical(&self, other: &Bone) -> bool {
    if self.traits != other.traits { return false }
    match (&self.kind, &other.kind) {
      (BoneKind::Field(a), BoneKind::Field(b)) => a.identical(b),
      (BoneKind::Struct(a), BoneKind::Struct(b))
      | (BoneKind::Union(a), BoneKind::Union(b)) => a.identical(b),
      _ => false,
    }
  }
}

impl Hash for Bone {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.traits.hash(state);
    std::mem::discriminant(&self.kind).hash(state);
    match &self.kind {
      BoneKind::Field(ty) => ty.hash(state),
      BoneKind::Struct(children) | BoneKind::Union(children) => children.hash(state),
    }
  }
}

/// An ordered bone sequence: a composite layout without names attached.
#[derive(Clone, Debug, Default)]
pub struct Skeleton {
  /// The bones in declaration order.
  pub bones: Vec<Bone>,
}

impl Skeleton {
  /// An empty skeleton.
  #[must_use] pub fn new() -> Skeleton { Skeleton::default() }

  /// Append a leaf field bone.
  pub fn add_field(&mut self, ty: Type) {
    self.bones.push(Bone { traits: BoneTraits::empty(), kind: BoneKind::Field(ty) });
  }

  /// Append an anonymous struct bone and return its child skeleton. The
  /// borrow is only valid until the next bone is added.
  pub fn add_struct(&mut self, traits: BoneTraits) -> &mut Skeleton {
    self.bones.push(Bone { traits, kind: BoneKind::Struct(Skeleton::new()) });
    match &mut self.bones.last_mut().expect("just pushed").kind {
      BoneKind::Struct(children) => children,
      _ => unreachable!(),
    }
  }

  /// Append an anonymous union bone and return its child skeleton. The
  /// borrow is only valid until the next bone is added.
  pub fn add_union(&mut self, traits: BoneTraits) -> &mut Skeleton {
    self.bones.push(Bone { traits, kind: BoneKind::Union(Skeleton::new()) });
    match &mut self.bones.last_mut().expect("just pushed").kind {
      BoneKind::Union(children) => children,
      _ => unreachable!(),
    }
  }

  /// The type of the leaf field at an endpoint, if the endpoint resolves
  /// to one.
  #[must_use] pub fn get_type(&self, endpoint: &Endpoint) -> Option<&Type> {
    let mut skeleton = self;
    let mut indices = endpoint.indices().iter();

    let mut index = *indices.next()?;
    loop {
      let bone = skeleton.bones.get(index as usize)?;
      match &bone.kind {
        BoneKind::Field(ty) =>
          return if indices.next().is_none() { Some(ty) } else { None },
        BoneKind::Struct(children) | BoneKind::Union(children) => {
          skeleton = children;
          index = *indices.next()?;
        }
      }
    }
  }

  /// The type of the leaf bone at root index `index`, if that bone is a
  /// leaf.
  #[must_use] pub fn get_type_at_index(&self, index: usize) -> Option<&Type> {
    match self.bones.get(index) {
      Some(Bone { kind: BoneKind::Field(ty), .. }) => Some(ty),
      _ => None,
    }
  }

  /// Whether a polymorphic variable occurs anywhere in the skeleton.
  #[must_use] pub fn has_polymorph(&self) -> bool {
    self.bones.iter().any(Bone::has_polymorph)
  }

  /// Whether two skeletons are structurally identical.
  #[must_use] pub fn identical(&self, other: &Skeleton) -> bool {
    self.bones.len() == other.bones.len()
      && self.bones.iter().zip(&other.bones).all(|(a, b)| a.identical(b))
  }
}

impl Hash for Skeleton {
  fn hash<H: Hasher>(&self, state: &mut H) {
    for bone in &self.bones { bone.hash(state) }
  }
}

/// Kind of root of a composite layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LayoutKind {
  /// Members at successive offsets.
  Struct,
  /// Members overlapping at offset zero.
  Union,
}

impl LayoutKind {
  /// The surface keyword for this kind.
  #[must_use] pub fn name(self) -> &'static str {
    match self {
      LayoutKind::Struct => "struct",
      LayoutKind::Union => "union",
    }
  }
}

/// A composite shape: kind, skeleton, names, modifier bits.
#[derive(Clone, Debug)]
pub struct Layout {
  /// Struct or union at the root.
  pub kind: LayoutKind,
  /// The name-to-endpoint arrows.
  pub field_map: FieldMap,
  /// The bone tree.
  pub skeleton: Skeleton,
  /// Modifier bits (`packed`).
  pub traits: LayoutTraits,
}

impl Layout {
  /// An empty layout of the given kind.
  #[must_use] pub fn new(kind: LayoutKind, traits: LayoutTraits) -> Layout {
    Layout { kind, field_map: FieldMap::new(), skeleton: Skeleton::new(), traits }
  }

  /// A flat struct layout from parallel field names and types.
  #[must_use] pub fn with_struct_fields(
    names: impl IntoIterator<Item = String>,
    types: impl IntoIterator<Item = Type>,
  ) -> Layout {
    let mut layout = Layout::new(LayoutKind::Struct, LayoutTraits::empty());

    for (i, (name, ty)) in names.into_iter().zip(types).enumerate() {
      let mut endpoint = Endpoint::new();
      assert!(endpoint.add_index(i as u16));
      layout.field_map.add(name, endpoint);
      layout.skeleton.add_field(ty);
    }

    layout
  }

  /// Compute how to arrive at `endpoint`: an offset waypoint per struct
  /// step, a bitcast waypoint per union step. Fails if an index exceeds
  /// the skeleton's bounds or the endpoint does not stop at a leaf.
  #[must_use] pub fn get_path(&self, endpoint: &Endpoint) -> Option<Path> {
    let mut path = Path::new();
    let mut skeleton = &self.skeleton;
    let indices = endpoint.indices();

    let (&first, rest) = indices.split_first()?;
    match self.kind {
      LayoutKind::Struct => path.push(Waypoint::Offset(first as usize)),
      LayoutKind::Union => path.push(Waypoint::Bitcast),
    }

    let mut index = first as usize;
    let mut rest = rest.iter();
    loop {
      let bone = skeleton.bones.get(index)?;
      match &bone.kind {
        BoneKind::Field(_) =>
          return if rest.next().is_none() { Some(path) } else { None },
        BoneKind::Struct(children) => {
          let &next = rest.next()?;
          path.push(Waypoint::Offset(next as usize));
          skeleton = children;
          index = next as usize;
        }
        BoneKind::Union(children) => {
          let &next = rest.next()?;
          path.push(Waypoint::Bitcast);
          skeleton = children;
          index = next as usize;
        }
      }
    }
  }

  /// Whether this is a flat struct.
  #[must_use] pub fn is_simple_struct(&self) -> bool {
    self.kind == LayoutKind::Struct && self.field_map.is_simple()
  }

  /// Whether this is a union whose every endpoint is one index long.
  #[must_use] pub fn is_simple_union(&self) -> bool {
    self.kind == LayoutKind::Union
      && self.field_map.arrows.iter().all(|arrow| arrow.endpoint.len() == 1)
  }

  /// Whether a polymorphic variable occurs anywhere in the skeleton.
  #[must_use] pub fn has_polymorph(&self) -> bool {
    self.skeleton.has_polymorph()
  }

  /// Whether two layouts are structurally identical.
  #[must_use] pub fn identical(&self, other: &Layout) -> bool {
    self.kind == other.kind
      && self.traits == other.traits
      && self.field_map.identical(&other.field_map)
      && self.skeleton.identical(&other.skeleton)
  }

  /// The field type at the endpoint `name` maps to, with the endpoint
  /// itself.
  #[must_use] pub fn find_field(&self, name: &str) -> Option<(&Endpoint, &Type)> {
    let endpoint = self.field_map.find(name)?;
    Some((endpoint, self.skeleton.get_type(endpoint)?))
  }
}

impl Hash for Layout {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.kind.hash(state);
    self.field_map.hash(state);
    self.skeleton.hash(state);
    self.traits.hash(state);
  }
}

fn fmt_skeleton(
  f: &mut fmt::Formatter<'_>,
  skeleton: &Skeleton,
  field_map: &FieldMap,
  root: &Endpoint,
) -> fmt::Result {
  write!(f, "(")?;
  for (i, bone) in skeleton.bones.iter().enumerate() {
    if i != 0 { write!(f, ", ")? }

    let mut endpoint = root.clone();
    if !endpoint.add_index(i as u16) {
      // Deeper than MAX_DEPTH cannot be named; render a placeholder.
      write!(f, "...")?;
      continue;
    }

    match &bone.kind {
      BoneKind::Field(ty) => {
        let name = field_map.name_of_endpoint(&endpoint).unwrap_or("?");
        write!(f, "{name} {ty}")?;
      }
      BoneKind::Struct(children) => {
        write!(f, "struct ")?;
        fmt_skeleton(f, children, field_map, &endpoint)?;
      }
      BoneKind::Union(children) => {
        write!(f, "union ")?;
        fmt_skeleton(f, children, field_map, &endpoint)?;
      }
    }
  }
  write!(f, ")")
}

impl fmt::Display for Layout {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ", self.kind.name())?;
    fmt_skeleton(f, &self.skeleton, &self.field_map, &Endpoint::new())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::hash::{DefaultHasher, Hash, Hasher};

  fn hash_of(layout: &Layout) -> u64 {
    let mut hasher = DefaultHasher::new();
    layout.hash(&mut hasher);
    hasher.finish()
  }

  fn endpoint(indices: &[u16]) -> Endpoint {
    Endpoint::from_indices(indices).expect("within depth limit")
  }

  /// `struct (is_float bool, union (f float, s *ubyte))`
  fn nested_layout() -> Layout {
    let mut layout = Layout::new(LayoutKind::Struct, LayoutTraits::empty());
    layout.skeleton.add_field(Type::base("bool"));
    let inner = layout.skeleton.add_union(BoneTraits::empty());
    inner.add_field(Type::base("float"));
    inner.add_field(Type::base_ptr("ubyte"));

    layout.field_map.add("is_float", endpoint(&[0]));
    layout.field_map.add("f", endpoint(&[1, 0]));
    layout.field_map.add("s", endpoint(&[1, 1]));
    layout
  }

  #[test]
  fn endpoint_append_and_capacity() {
    let mut e = Endpoint::new();
    for i in 0..MAX_DEPTH {
      assert!(e.add_index(i as u16));
      assert_eq!(e.len(), i + 1);
      assert_eq!(e.get(i), Some(i as u16));
    }
    let snapshot = e.clone();
    assert!(!e.add_index(99));
    assert_eq!(e, snapshot);
  }

  #[test]
  fn simplicity_tracking() {
    let mut simple = FieldMap::new();
    simple.add("x", endpoint(&[0]));
    simple.add("y", endpoint(&[1]));
    assert!(simple.is_simple());

    let mut nested = FieldMap::new();
    nested.add("x", endpoint(&[0]));
    nested.add("y", endpoint(&[1, 0]));
    assert!(!nested.is_simple());
  }

  #[test]
  fn path_walks_offsets_and_bitcasts() {
    let layout = nested_layout();

    assert_eq!(
      layout.get_path(&endpoint(&[0])).expect("valid").as_slice(),
      &[Waypoint::Offset(0)],
    );
    assert_eq!(
      layout.get_path(&endpoint(&[1, 1])).expect("valid").as_slice(),
      &[Waypoint::Offset(1), Waypoint::Bitcast],
    );
    assert!(layout.get_path(&endpoint(&[7])).is_none());
    assert!(layout.get_path(&endpoint(&[0, 0])).is_none());
  }

  #[test]
  fn simple_struct_and_union() {
    let flat = Layout::with_struct_fields(
      vec!["x".to_string(), "y".to_string()],
      vec![Type::base("int"), Type::base("int")],
    );
    assert!(flat.is_simple_struct());
    assert!(!flat.is_simple_union());
    assert!(!nested_layout().is_simple_struct());
  }

  #[test]
  fn field_lookup_and_reverse_lookup() {
    let layout = nested_layout();
    let (field, ty) = layout.find_field("s").expect("present");
    assert_eq!(field, &endpoint(&[1, 1]));
    assert!(ty.is_base_ptr_of("ubyte"));
    assert_eq!(layout.field_map.name_of_endpoint(&endpoint(&[1, 0])), Some("f"));
    assert!(layout.find_field("missing").is_none());
  }

  #[test]
  fn identical_layouts_hash_equal() {
    let a = nested_layout();
    let b = nested_layout();
    assert!(a.identical(&b));
    assert_eq!(hash_of(&a), hash_of(&b));

    let flat = Layout::with_struct_fields(
      vec!["x".to_string()],
      vec![Type::base("int")],
    );
    assert!(!a.identical(&flat));
  }

  #[test]
  fn renders_with_names() {
    assert_eq!(
      nested_layout().to_string(),
      "struct (is_float bool, union (f float, s *ubyte))",
    );
  }

  #[test]
  fn skeleton_type_navigation() {
    let layout = nested_layout();
    assert!(layout.skeleton.get_type(&endpoint(&[1, 0])).expect("leaf").is_base_of("float"));
    assert!(layout.skeleton.get_type_at_index(0).expect("leaf").is_base_of("bool"));
    assert!(layout.skeleton.get_type_at_index(1).is_none());
    assert!(!layout.has_polymorph());
  }
}
