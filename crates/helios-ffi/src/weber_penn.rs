//! Procedural trees from Weber-Penn parameter sets.

use helios::core::context::{Context, Uuid};
use std::ffi::c_char;
use std::ptr;

#[cfg(feature = "weberpenntree")]
use {
    crate::buffer::{c_str, count_out, owned_array, owned_string_array, read, read_vec3},
    crate::error::FfiError,
    crate::handle::{PluginHandle, destroy, handle_mut, handle_ref},
    helios::plugins::weber_penn::WeberPennTree,
};

plugin_handle!("weberpenntree", WeberPennTreeHandle = PluginHandle<WeberPennTree>);

#[cfg(feature = "weberpenntree")]
fn tree_builder<'a>(handle: *mut WeberPennTreeHandle) -> Result<&'a mut WeberPennTreeHandle, FfiError> {
    handle_mut(handle, "WeberPennTree")
}

#[cfg(feature = "weberpenntree")]
fn tree_uuids(
    handle: *const WeberPennTreeHandle,
    count: *mut usize,
    select: impl FnOnce(&WeberPennTree, &Context) -> helios::plugins::weber_penn::Result<Vec<Uuid>>,
) -> Result<*mut Uuid, FfiError> {
    let count = count_out(count)?;
    let handle = handle_ref(handle, "WeberPennTree")?;
    Ok(owned_array(select(handle.model_ref(), handle.context())?, count))
}

plugin_exports! { "weberpenntree";
    fn createWeberPennTree(context: *mut Context) -> *mut WeberPennTreeHandle = ptr::null_mut() => {
        PluginHandle::create(context, WeberPennTree::new()?)
    }

    fn destroyWeberPennTree(tree: *mut WeberPennTreeHandle) -> () = () => {
        destroy(tree);
        Ok(())
    }

    /// Builds a tree of the named type with its trunk base at `origin`
    /// (3 floats) and returns its tree ID.
    fn buildTree(tree: *mut WeberPennTreeHandle, name: *const c_char, origin: *const f32, scale: f32) -> u32 = 0 => {
        let (model, context) = tree_builder(tree)?.split();
        let name = c_str(name, "tree name")?;
        let origin = read_vec3(origin, "origin")?;
        Ok(model.build_tree(context, name, origin, scale)?)
    }

    fn getWeberPennTreeTrunkUUIDs(tree: *const WeberPennTreeHandle, tree_id: u32, count: *mut usize) -> *mut Uuid = ptr::null_mut() => {
        tree_uuids(tree, count, |model, context| model.trunk_uuids(context, tree_id))
    }

    fn getWeberPennTreeBranchUUIDs(tree: *const WeberPennTreeHandle, tree_id: u32, count: *mut usize) -> *mut Uuid = ptr::null_mut() => {
        tree_uuids(tree, count, |model, context| model.branch_uuids(context, tree_id))
    }

    fn getWeberPennTreeLeafUUIDs(tree: *const WeberPennTreeHandle, tree_id: u32, count: *mut usize) -> *mut Uuid = ptr::null_mut() => {
        tree_uuids(tree, count, |model, context| model.leaf_uuids(context, tree_id))
    }

    /// Trunk, then branch, then leaf UUIDs.
    fn getWeberPennTreeAllUUIDs(tree: *const WeberPennTreeHandle, tree_id: u32, count: *mut usize) -> *mut Uuid = ptr::null_mut() => {
        tree_uuids(tree, count, |model, context| model.all_uuids(context, tree_id))
    }

    /// Deepest branch level generated by later builds. 0 builds a bare trunk.
    fn setBranchRecursionLevel(tree: *mut WeberPennTreeHandle, level: u32) -> () = () => {
        tree_builder(tree)?.model().set_branch_recursion_level(level);
        Ok(())
    }

    fn setTrunkSegmentResolution(tree: *mut WeberPennTreeHandle, divisions: u32) -> () = () => {
        tree_builder(tree)?.model().set_trunk_segment_resolution(divisions)?;
        Ok(())
    }

    fn setBranchSegmentResolution(tree: *mut WeberPennTreeHandle, divisions: u32) -> () = () => {
        tree_builder(tree)?.model().set_branch_segment_resolution(divisions)?;
        Ok(())
    }

    /// `subdivisions` holds the leaf tile counts along length and width.
    fn setLeafSubdivisions(tree: *mut WeberPennTreeHandle, subdivisions: *const u32) -> () = () => {
        let model = tree_builder(tree)?;
        let [nx, ny] = read::<2, u32>(subdivisions, "leaf subdivisions")?;
        model.model().set_leaf_subdivisions((nx, ny))?;
        Ok(())
    }

    fn getAvailableTreeNames(tree: *const WeberPennTreeHandle, count: *mut usize) -> *mut *mut c_char = ptr::null_mut() => {
        let count = count_out(count)?;
        let handle = handle_ref(tree, "WeberPennTree")?;
        Ok(owned_string_array(handle.model_ref().available_tree_names(), count))
    }

    /// Adds the trees of a TOML parameter file and returns their names.
    fn loadTreeLibrary(tree: *mut WeberPennTreeHandle, path: *const c_char, count: *mut usize) -> *mut *mut c_char = ptr::null_mut() => {
        let count = count_out(count)?;
        let model = tree_builder(tree)?;
        let names = model.model().load_tree_library(c_str(path, "path")?)?;
        Ok(owned_string_array(names, count))
    }
}

#[cfg(all(test, feature = "weberpenntree"))]
mod tests {
    use super::*;
    use crate::buffer::take;
    use crate::context::fixtures::*;
    use crate::context::getPrimitiveCount;
    use std::ffi::CString;

    struct TestTree(*mut WeberPennTreeHandle);

    impl Drop for TestTree {
        fn drop(&mut self) {
            destroyWeberPennTree(self.0);
        }
    }

    fn uuids(f: extern "C" fn(*const WeberPennTreeHandle, u32, *mut usize) -> *mut Uuid, tree: &TestTree, id: u32) -> Vec<Uuid> {
        let mut count = 0;
        take::array(f(tree.0, id, &mut count), count)
    }

    #[test]
    fn built_tree_partitions_its_primitives() {
        let ctx = TestContext::new();
        let tree = TestTree(createWeberPennTree(ctx.0));
        let name = CString::new("lemon").unwrap();
        let origin = [0.0f32; 3];
        let id = buildTree(tree.0, name.as_ptr(), origin.as_ptr(), 1.0);
        assert_eq!(last_code(), 0);
        assert_eq!(id, 0);

        let trunk = uuids(getWeberPennTreeTrunkUUIDs, &tree, id);
        let branches = uuids(getWeberPennTreeBranchUUIDs, &tree, id);
        let leaves = uuids(getWeberPennTreeLeafUUIDs, &tree, id);
        let all = uuids(getWeberPennTreeAllUUIDs, &tree, id);
        assert!(!trunk.is_empty() && !branches.is_empty() && !leaves.is_empty());
        assert_eq!(all.len(), trunk.len() + branches.len() + leaves.len());
        assert_eq!(all.len(), getPrimitiveCount(ctx.0));
        assert_eq!(all[..trunk.len()], trunk[..]);

        let second = buildTree(tree.0, name.as_ptr(), origin.as_ptr(), 0.5);
        assert_eq!(second, 1);
    }

    #[test]
    fn recursion_level_zero_builds_a_bare_trunk() {
        let ctx = TestContext::new();
        let tree = TestTree(createWeberPennTree(ctx.0));
        setBranchRecursionLevel(tree.0, 0);
        setTrunkSegmentResolution(tree.0, 8);
        let name = CString::new("olive").unwrap();
        let origin = [1.0f32, 1.0, 0.0];
        let id = buildTree(tree.0, name.as_ptr(), origin.as_ptr(), 1.0);
        assert!(uuids(getWeberPennTreeBranchUUIDs, &tree, id).is_empty());
        assert!(!uuids(getWeberPennTreeTrunkUUIDs, &tree, id).is_empty());
    }

    #[test]
    fn invalid_requests_are_classified() {
        let ctx = TestContext::new();
        let tree = TestTree(createWeberPennTree(ctx.0));
        let origin = [0.0f32; 3];

        let unknown = CString::new("baobab").unwrap();
        buildTree(tree.0, unknown.as_ptr(), origin.as_ptr(), 1.0);
        assert_eq!(last_code(), 2);
        assert!(last_message().contains("baobab"));

        let apple = CString::new("apple").unwrap();
        buildTree(tree.0, apple.as_ptr(), origin.as_ptr(), 0.0);
        assert_eq!(last_code(), 1);
        setBranchSegmentResolution(tree.0, 2);
        assert_eq!(last_code(), 1);
        let subdivisions = [0u32, 2];
        setLeafSubdivisions(tree.0, subdivisions.as_ptr());
        assert_eq!(last_code(), 1);

        let mut count = 0;
        assert!(getWeberPennTreeLeafUUIDs(tree.0, 3, &mut count).is_null());
        assert_eq!(last_code(), 2);
        assert_eq!(getPrimitiveCount(ctx.0), 0);
    }

    #[test]
    fn library_lists_and_extends_tree_names() {
        let ctx = TestContext::new();
        let tree = TestTree(createWeberPennTree(ctx.0));
        let mut count = 0;
        let names = take::strings(getAvailableTreeNames(tree.0, &mut count), count);
        assert_eq!(names.len(), 9);
        assert!(names.iter().any(|n| n == "walnut"));

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("trees.toml");
        std::fs::write(&file, "[shrub]\nscale = 1.0\nleaves = 4\nlevels = [ { segments = 2 } ]\n").unwrap();
        let path = CString::new(file.to_str().unwrap()).unwrap();
        let loaded = take::strings(loadTreeLibrary(tree.0, path.as_ptr(), &mut count), count);
        assert_eq!(loaded, vec!["shrub"]);

        let shrub = CString::new("shrub").unwrap();
        let origin = [0.0f32; 3];
        let id = buildTree(tree.0, shrub.as_ptr(), origin.as_ptr(), 1.0);
        assert_eq!(uuids(getWeberPennTreeLeafUUIDs, &tree, id).len(), 4);

        let missing = CString::new(dir.path().join("none.toml").to_str().unwrap()).unwrap();
        assert!(loadTreeLibrary(tree.0, missing.as_ptr(), &mut count).is_null());
        assert_eq!(last_code(), 3);
    }
}

#[cfg(all(test, not(feature = "weberpenntree")))]
mod tests {
    use super::*;

    #[test]
    fn compiled_out_group_reports_unavailable() {
        assert!(createWeberPennTree(ptr::null_mut()).is_null());
        assert_eq!(crate::error::getLastErrorCode(), 6);
    }
}
